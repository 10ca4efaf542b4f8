//! Holding register layout of the meter.
//!
//! Addresses are 0-based protocol offsets as sent on the wire.

use std::fmt;

use crate::codec::{Address, DataType, Quantity};

/// One "read holding registers" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBlock {
    pub start: Address,
    pub count: Quantity,
    pub unit_id: u8,
}

impl RegisterBlock {
    pub fn new(start: Address, count: Quantity, unit_id: u8) -> Self {
        Self {
            start,
            count,
            unit_id,
        }
    }
}

/// The register blocks read from the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterBlock {
    Model,
    Manufacturer,
    Voltages,
    Currents,
    PowerFactors,
    Frequency,
}

impl MeterBlock {
    /// Blocks read on every cycle, in read order.
    pub const MEASUREMENTS: [MeterBlock; 4] = [
        MeterBlock::Voltages,
        MeterBlock::Currents,
        MeterBlock::PowerFactors,
        MeterBlock::Frequency,
    ];

    pub fn address(self) -> Address {
        match self {
            MeterBlock::Model => 49,
            MeterBlock::Manufacturer => 69,
            MeterBlock::Voltages => 3019,
            MeterBlock::Currents => 2999,
            MeterBlock::PowerFactors => 3077,
            MeterBlock::Frequency => 3109,
        }
    }

    pub fn count(self) -> Quantity {
        match self {
            MeterBlock::Model | MeterBlock::Manufacturer => 20,
            MeterBlock::Voltages => 14,
            MeterBlock::Currents | MeterBlock::PowerFactors => 8,
            MeterBlock::Frequency => 2,
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            MeterBlock::Model | MeterBlock::Manufacturer => DataType::Text,
            _ => DataType::Float32,
        }
    }

    /// Request for this block addressed to `unit_id`.
    pub fn at(self, unit_id: u8) -> RegisterBlock {
        RegisterBlock::new(self.address(), self.count(), unit_id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeterBlock::Model => "model",
            MeterBlock::Manufacturer => "manufacturer",
            MeterBlock::Voltages => "voltage",
            MeterBlock::Currents => "current",
            MeterBlock::PowerFactors => "power factor",
            MeterBlock::Frequency => "frequency",
        }
    }
}

impl fmt::Display for MeterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
