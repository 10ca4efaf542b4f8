//! State shared with readers of the meter.
//!
//! The poller owns the [`StatePublisher`]; any number of [`MeterHandle`]s can
//! observe it. Every update replaces the whole [`MeterState`] under the
//! channel lock, so a reader never sees values from two different cycles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::PollError;
use crate::snapshot::{DeviceIdentity, MetricKey, Snapshot};

/// Everything published about one meter.
#[derive(Debug, Clone, Default)]
pub struct MeterState {
    /// Last fully successful reading; `None` until the first success.
    pub snapshot: Option<Arc<Snapshot>>,
    pub identity: Option<DeviceIdentity>,
    /// Error of the most recent cycle, cleared by the next success.
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
}

/// Write side of the meter state.
#[derive(Debug)]
pub struct StatePublisher {
    tx: watch::Sender<MeterState>,
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MeterState::default());
        Self { tx }
    }

    /// New reader of the published state.
    pub fn handle(&self) -> MeterHandle {
        MeterHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Swap in a new snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        self.tx.send_modify(|state| {
            state.last_success = Some(snapshot.captured_at());
            state.snapshot = Some(snapshot);
            state.last_error = None;
            state.consecutive_failures = 0;
        });
    }

    pub fn publish_identity(&self, identity: DeviceIdentity) {
        self.tx.send_if_modified(|state| {
            if state.identity.as_ref() == Some(&identity) {
                return false;
            }
            state.identity = Some(identity);
            true
        });
    }

    /// Record a failed cycle, keeping the last good snapshot.
    pub fn record_failure(&self, err: &PollError) {
        self.tx.send_modify(|state| {
            state.last_error = Some(err.to_string());
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        });
    }
}

/// Read side of the meter state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MeterHandle {
    rx: watch::Receiver<MeterState>,
}

impl MeterHandle {
    pub fn state(&self) -> MeterState {
        self.rx.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.rx.borrow().snapshot.clone()
    }

    pub fn value(&self, key: MetricKey) -> Option<f64> {
        self.rx.borrow().snapshot.as_ref().map(|s| s.get(key))
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.rx.borrow().identity.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.rx.borrow().last_error.clone()
    }

    /// Wait for the next update. Returns `false` once the publisher is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
