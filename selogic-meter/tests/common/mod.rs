#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use selogic_meter::codec::{encode_text, Address, Encode, Word};
use selogic_meter::error::{ConnectError, ReadError};
use selogic_meter::register_map::{MeterBlock, RegisterBlock};
use selogic_meter::snapshot::Snapshot;
use selogic_meter::state::MeterHandle;
use selogic_meter::transport::Transport;

pub const VOLTAGES: [f32; 7] = [400.0, 401.5, 402.25, 0.0, 230.0, 231.5, 232.75];
pub const CURRENTS: [f32; 4] = [10.0, 11.25, 12.5, 1.0];
pub const RAW_POWER_FACTORS: [f32; 4] = [0.9, -1.2, 1.5, -0.5];
pub const EXPECTED_POWER_FACTORS: [f64; 4] = [90.0, -80.0, 50.0, -50.0];
pub const FREQUENCY: f32 = 49.98;
pub const MODEL: &str = "PM5560";
pub const MANUFACTURER: &str = "Schneider Electric";

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Protocol,
    Timeout,
    Lost,
}

/// Shared, test-controlled behavior of [`MockTransport`].
#[derive(Default)]
pub struct Script {
    pub blocks: HashMap<Address, Vec<Word>>,
    pub faults: HashMap<Address, Fault>,
    pub refuse_connect: bool,
    pub read_delay: Duration,
    /// Only this many reads are delayed, when set.
    pub delayed_reads: Option<usize>,

    pub connects: usize,
    pub closes: usize,
    pub reads: Vec<Address>,
    pub open_sessions: usize,
    pub max_open_sessions: usize,

    /// Sampled on every read to observe what readers see mid-cycle.
    pub probe: Option<MeterHandle>,
    pub observed: Vec<Option<Arc<Snapshot>>>,
}

impl Script {
    pub fn reads_of(&self, block: MeterBlock) -> usize {
        self.reads.iter().filter(|a| **a == block.address()).count()
    }
}

pub fn floats(values: &[f32]) -> Vec<Word> {
    values.iter().flat_map(|v| v.to_be_words()).collect()
}

/// Register payloads of a healthy meter.
pub fn meter_blocks() -> HashMap<Address, Vec<Word>> {
    HashMap::from([
        (MeterBlock::Model.address(), encode_text(MODEL, 20)),
        (MeterBlock::Manufacturer.address(), encode_text(MANUFACTURER, 20)),
        (MeterBlock::Voltages.address(), floats(&VOLTAGES)),
        (MeterBlock::Currents.address(), floats(&CURRENTS)),
        (MeterBlock::PowerFactors.address(), floats(&RAW_POWER_FACTORS)),
        (MeterBlock::Frequency.address(), floats(&[FREQUENCY])),
    ])
}

pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    connected: bool,
}

impl MockTransport {
    pub fn healthy() -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script {
            blocks: meter_blocks(),
            ..Script::default()
        }));
        (
            Self {
                script: script.clone(),
                connected: false,
            },
            script,
        )
    }
}

pub fn lock(script: &Arc<Mutex<Script>>) -> MutexGuard<'_, Script> {
    script.lock().unwrap()
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        let mut script = self.script.lock().unwrap();
        script.connects += 1;
        if script.refuse_connect {
            return Err(ConnectError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        script.open_sessions += 1;
        script.max_open_sessions = script.max_open_sessions.max(script.open_sessions);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn read_holding_registers(
        &mut self,
        block: RegisterBlock,
        timeout: Duration,
    ) -> Result<Vec<Word>, ReadError> {
        assert!(self.connected, "read on closed transport");
        assert_eq!(block.unit_id, 1);

        let delay = {
            let script = self.script.lock().unwrap();
            match script.delayed_reads {
                Some(limit) if script.reads.len() >= limit => Duration::ZERO,
                _ => script.read_delay,
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        script.reads.push(block.start);
        if let Some(handle) = script.probe.clone() {
            script.observed.push(handle.snapshot());
        }

        match script.faults.get(&block.start) {
            Some(Fault::Protocol) => {
                return Err(ReadError::ProtocolError(
                    "Exception: IllegalDataAddress".into(),
                ))
            }
            Some(Fault::Timeout) => return Err(ReadError::Timeout(timeout)),
            Some(Fault::Lost) => {
                self.connected = false;
                return Err(ReadError::ConnectionLost("reset by peer".into()));
            }
            None => {}
        }

        script
            .blocks
            .get(&block.start)
            .cloned()
            .ok_or_else(|| ReadError::ProtocolError("Exception: IllegalDataAddress".into()))
    }

    async fn close(&mut self) {
        let mut script = self.script.lock().unwrap();
        script.closes += 1;
        if self.connected {
            script.open_sessions -= 1;
            self.connected = false;
        }
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}
