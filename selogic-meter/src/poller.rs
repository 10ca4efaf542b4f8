//! One poll cycle against the meter.
//!
//! ```text
//! Idle -> Connecting -> [IdentityResolution] -> Reading(voltage) -> Reading(current)
//!      -> Reading(power factor) -> Reading(frequency) -> Publishing -> Closing -> Idle
//! ```
//!
//! Any failure jumps straight to `Closing`. The connection is closed at the
//! end of every cycle, successful or not.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::codec::{decode_f32s, decode_text, WordOrder};
use crate::error::{DecodeError, PollError};
use crate::power_factor;
use crate::register_map::MeterBlock;
use crate::snapshot::{DeviceIdentity, Snapshot};
use crate::state::{MeterHandle, StatePublisher};
use crate::transport::Transport;

/// Where the poller currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Connecting,
    IdentityResolution,
    Reading(MeterBlock),
    Publishing,
    Closing,
}

/// Per-meter polling parameters.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub name: String,
    pub unit_id: u8,
    pub request_timeout: Duration,
    pub word_order: WordOrder,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            name: "SELogic Power Meter".to_string(),
            unit_id: 1,
            request_timeout: Duration::from_secs(10),
            word_order: WordOrder::Big,
        }
    }
}

/// Drives poll cycles for a single meter and publishes the results.
pub struct MeterPoller<T: Transport> {
    transport: T,
    settings: PollerSettings,
    identity: Option<DeviceIdentity>,
    publisher: StatePublisher,
    state: CycleState,
}

impl<T: Transport> MeterPoller<T> {
    pub fn new(transport: T, settings: PollerSettings) -> Self {
        Self {
            transport,
            settings,
            identity: None,
            publisher: StatePublisher::new(),
            state: CycleState::Idle,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Reader of the published snapshot, identity and error state.
    pub fn handle(&self) -> MeterHandle {
        self.publisher.handle()
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run one complete cycle.
    ///
    /// On success the new snapshot has been published. On failure the
    /// previously published snapshot is left untouched and the error is
    /// recorded in the published state.
    pub async fn poll_cycle(&mut self) -> Result<(), PollError> {
        let outcome = self.run_cycle().await;

        self.transition(CycleState::Closing);
        self.transport.close().await;
        self.transition(CycleState::Idle);

        if let Err(err) = &outcome {
            if err.is_transient() {
                warn!("Meter '{}': poll cycle failed: {}", self.settings.name, err);
            } else {
                error!("Meter '{}': poll cycle failed: {}", self.settings.name, err);
            }
            self.publisher.record_failure(err);
        }

        outcome
    }

    async fn run_cycle(&mut self) -> Result<(), PollError> {
        if !self.transport.is_connected() {
            self.transition(CycleState::Connecting);
            self.transport.connect().await?;
        }

        if self.identity.is_none() {
            self.transition(CycleState::IdentityResolution);
            let identity = self.resolve_identity().await?;
            info!(
                "Meter '{}': model '{}', manufacturer '{}'",
                self.settings.name, identity.model, identity.manufacturer
            );
            self.publisher.publish_identity(identity.clone());
            self.identity = Some(identity);
        }

        let voltages: [f32; 7] = self.read_floats(MeterBlock::Voltages).await?;
        let currents: [f32; 4] = self.read_floats(MeterBlock::Currents).await?;
        let raw_power_factors: [f32; 4] = self.read_floats(MeterBlock::PowerFactors).await?;
        let mut power_factors = [0.0_f64; 4];
        for (slot, raw) in power_factors.iter_mut().zip(raw_power_factors) {
            *slot = power_factor::to_percent(raw).map_err(|source| PollError::Decode {
                block: MeterBlock::PowerFactors,
                source,
            })?;
        }
        let [frequency]: [f32; 1] = self.read_floats(MeterBlock::Frequency).await?;

        self.transition(CycleState::Publishing);
        let snapshot = Snapshot::assemble(
            &voltages,
            &currents,
            &power_factors,
            frequency,
            Utc::now(),
        );
        debug!("Meter '{}': {}", self.settings.name, snapshot);
        self.publisher.publish(snapshot);

        Ok(())
    }

    /// Both strings must be read before the identity is cached, so a
    /// half-resolved identity is retried as a whole on the next cycle.
    async fn resolve_identity(&mut self) -> Result<DeviceIdentity, PollError> {
        let model = self.read_text(MeterBlock::Model).await?;
        let manufacturer = self.read_text(MeterBlock::Manufacturer).await?;
        Ok(DeviceIdentity {
            model,
            manufacturer,
        })
    }

    async fn read_block(&mut self, block: MeterBlock) -> Result<Vec<u16>, PollError> {
        self.transition(CycleState::Reading(block));
        self.transport
            .read_holding_registers(block.at(self.settings.unit_id), self.settings.request_timeout)
            .await
            .map_err(|source| PollError::Read { block, source })
    }

    async fn read_floats<const N: usize>(
        &mut self,
        block: MeterBlock,
    ) -> Result<[f32; N], PollError> {
        let words = self.read_block(block).await?;
        let values = decode_f32s(&words, self.settings.word_order)
            .map_err(|source| PollError::Decode { block, source })?;
        values
            .try_into()
            .map_err(|values: Vec<f32>| PollError::Decode {
                block,
                source: DecodeError::LengthMismatch {
                    width: 2 * N,
                    actual: 2 * values.len(),
                },
            })
    }

    async fn read_text(&mut self, block: MeterBlock) -> Result<String, PollError> {
        let words = self.read_block(block).await?;
        let expected = usize::from(block.count());
        if words.len() != expected {
            return Err(PollError::Decode {
                block,
                source: DecodeError::LengthMismatch {
                    width: expected,
                    actual: words.len(),
                },
            });
        }
        Ok(decode_text(&words))
    }

    fn transition(&mut self, next: CycleState) {
        debug!("Meter '{}': {:?} -> {:?}", self.settings.name, self.state, next);
        self.state = next;
    }
}
