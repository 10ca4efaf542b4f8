use std::time::Duration;

use thiserror::Error;

use crate::register_map::MeterBlock;

/// Failure to open a TCP session to the meter.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single "read holding registers" request.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// Raw register content that does not fit the expected layout or domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Register count {actual} is not a multiple of {width}")]
    LengthMismatch { width: usize, actual: usize },
    #[error("Value {0} out of expected range (-2 to 2)")]
    OutOfRange(f64),
}

/// Outcome of a failed poll cycle.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("Reading {block} registers failed: {source}")]
    Read {
        block: MeterBlock,
        #[source]
        source: ReadError,
    },
    #[error("Decoding {block} registers failed: {source}")]
    Decode {
        block: MeterBlock,
        #[source]
        source: DecodeError,
    },
}

impl PollError {
    /// Field-bus failures are expected to clear up on their own; decode
    /// failures point at a firmware or register map mismatch.
    pub fn is_transient(&self) -> bool {
        !matches!(self, PollError::Decode { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}
