//! Polls a SELogic power meter over Modbus-TCP and logs each new snapshot.

use anyhow::{bail, Context, Result};
use clap::Parser;
use selogic_meter::config::{LoggingConfig, MeterConfig, MeterPollerConfig};
use selogic_meter::poller::MeterPoller;
use selogic_meter::scheduler::Scheduler;
use selogic_meter::state::MeterHandle;
use selogic_meter::transport::TcpTransport;
use std::path::PathBuf;
use tracing::{info, warn};

/// Modbus-TCP poller for three-phase power meters.
#[derive(Parser, Debug)]
#[command(name = "selogic-meter")]
#[command(about = "Polls a SELogic power meter and publishes its readings")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Meter host; required when no configuration file is given
    #[arg(long)]
    host: Option<String>,

    /// Modbus TCP port
    #[arg(long)]
    port: Option<u16>,

    /// Modbus unit/slave id
    #[arg(long)]
    unit_id: Option<u8>,

    /// Poll interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single poll cycle, print the snapshot as JSON and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn into_config(self) -> Result<(MeterPollerConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => MeterPollerConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => {
                let Some(host) = &self.host else {
                    bail!("either --config or --host must be given");
                };
                MeterPollerConfig {
                    meter: MeterConfig::with_host(host.clone()),
                    logging: LoggingConfig::default(),
                }
            }
        };

        if let Some(host) = self.host {
            config.meter.host = host;
        }
        if let Some(port) = self.port {
            config.meter.port = port;
        }
        if let Some(unit_id) = self.unit_id {
            config.meter.unit_id = unit_id;
        }
        if let Some(interval) = self.interval {
            config.meter.poll_interval_secs = interval;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate().context("Invalid configuration")?;
        Ok((config, self.once))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, once) = Args::parse().into_config()?;

    selogic_meter::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    let meter = &config.meter;
    info!(
        "Meter '{}' at {}:{} (unit {})",
        meter.name, meter.host, meter.port, meter.unit_id
    );

    let transport = TcpTransport::new(&meter.host, meter.port, meter.timeout());
    let mut poller = MeterPoller::new(transport, meter.poller_settings());

    if once {
        poller
            .poll_cycle()
            .await
            .context("Poll cycle failed")?;
        let snapshot = poller
            .handle()
            .snapshot()
            .context("No snapshot published")?;
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    let scheduler = Scheduler::new(poller, meter.poll_interval());
    let handle = scheduler.handle();
    let task = scheduler.spawn();
    let reporter = tokio::spawn(report_updates(handle));

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    task.abort();
    reporter.abort();
    info!("Meter poller stopped");

    Ok(())
}

/// Log every published change of the meter state.
async fn report_updates(mut handle: MeterHandle) {
    let mut last_identity = None;
    let mut last_captured = None;

    while handle.changed().await {
        let state = handle.state();

        if state.identity.is_some() && state.identity != last_identity {
            if let Some(identity) = &state.identity {
                info!(
                    "Identified {} {}",
                    identity.manufacturer, identity.model
                );
            }
            last_identity = state.identity.clone();
        }

        match &state.snapshot {
            Some(snapshot) if Some(snapshot.captured_at()) != last_captured => {
                info!("{}", snapshot);
                last_captured = Some(snapshot.captured_at());
            }
            _ => {}
        }

        if let Some(err) = &state.last_error {
            warn!(
                "Meter unavailable ({} consecutive failures): {}",
                state.consecutive_failures, err
            );
        }
    }
}
