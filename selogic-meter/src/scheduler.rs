use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::poller::MeterPoller;
use crate::state::MeterHandle;
use crate::transport::Transport;

/// Fires poll cycles on a fixed period.
///
/// The scheduler owns its poller, so a cycle can only start once the previous
/// one has finished. Ticks missed while a cycle overran are dropped, not queued.
pub struct Scheduler<T: Transport> {
    poller: MeterPoller<T>,
    interval: Duration,
}

impl<T: Transport + 'static> Scheduler<T> {
    pub fn new(poller: MeterPoller<T>, interval: Duration) -> Self {
        Self {
            poller,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn handle(&self) -> MeterHandle {
        self.poller.handle()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll forever. The first cycle starts immediately.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Starting poller for meter '{}' (interval: {:?})",
            self.poller.name(),
            self.interval
        );

        loop {
            ticker.tick().await;

            let started = Instant::now();
            if self.poller.poll_cycle().await.is_ok() {
                debug!(
                    "Meter '{}': cycle completed in {:?}",
                    self.poller.name(),
                    started.elapsed()
                );
            }

            let elapsed = started.elapsed();
            if elapsed > self.interval {
                warn!(
                    "Meter '{}': cycle took {:?}, longer than the {:?} interval; skipping missed ticks",
                    self.poller.name(),
                    elapsed,
                    self.interval
                );
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
