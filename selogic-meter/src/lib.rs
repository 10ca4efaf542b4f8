//! Modbus-TCP poller for three-phase SELogic power meters, based on [tokio-modbus](https://github.com/slowtec/tokio-modbus).

//! ## Overview
//!
//! Every poll cycle opens a TCP session, reads four holding register blocks
//! (voltages, currents, power factors, frequency), decodes them and publishes a
//! [`snapshot::Snapshot`] holding all fifteen metrics. The model and
//! manufacturer strings are read once, on the first cycle that succeeds in
//! reading both. The session is closed at the end of every cycle.
//!
//! A cycle either publishes a complete snapshot or nothing: readers of a
//! [`state::MeterHandle`] always see the last fully successful reading.
//!
//! ```ignore
//! use selogic_meter::{config::MeterConfig, poller::MeterPoller, scheduler::Scheduler, transport::TcpTransport};
//!
//! let meter = MeterConfig::with_host("192.168.1.50");
//! let transport = TcpTransport::new(&meter.host, meter.port, meter.timeout());
//! let scheduler = Scheduler::new(MeterPoller::new(transport, meter.poller_settings()), meter.poll_interval());
//! let handle = scheduler.handle();
//! scheduler.spawn();
//! ```

/// Utilities for encoding to and decoding from Modbus registers
pub mod codec;
/// Configuration file format and defaults
pub mod config;
/// Error types of every layer, from transport to configuration
pub mod error;
/// Folding of power factor registers into `[-1, 1]`
pub mod power_factor;
/// Poll cycle state machine
pub mod poller;
/// Register blocks exposed by the meter
pub mod register_map;
/// Periodic, non-overlapping poll cycles
pub mod scheduler;
/// Metrics published after a successful cycle
pub mod snapshot;
/// Published meter state and its readers
pub mod state;
/// Modbus transport abstraction and its TCP implementation
pub mod transport;

/// Meter simulator for tests and demos (based on tokio-modbus [servers examples](https://github.com/slowtec/tokio-modbus/tree/main/examples))
#[cfg(feature = "simulator")]
pub mod simulator;

use config::{LogFormat, LoggingConfig};
use error::ConfigError;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| ConfigError::Logging(e.to_string()))
}
