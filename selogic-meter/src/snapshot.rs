//! Typed meter readings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Decimal places used when rendering a reading.
pub const DISPLAY_PRECISION: usize = 2;

/// Physical quantity measured by a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricClass {
    Voltage,
    Current,
    PowerFactor,
    Frequency,
}

/// The fixed set of metrics published in a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    Ua,
    Ub,
    Uc,
    Uab,
    Ubc,
    Uca,
    Ia,
    Ib,
    Ic,
    In,
    PFa,
    PFb,
    PFc,
    PF,
    Freq,
}

impl MetricKey {
    pub const COUNT: usize = 15;

    pub const ALL: [MetricKey; MetricKey::COUNT] = [
        MetricKey::Ua,
        MetricKey::Ub,
        MetricKey::Uc,
        MetricKey::Uab,
        MetricKey::Ubc,
        MetricKey::Uca,
        MetricKey::Ia,
        MetricKey::Ib,
        MetricKey::Ic,
        MetricKey::In,
        MetricKey::PFa,
        MetricKey::PFb,
        MetricKey::PFc,
        MetricKey::PF,
        MetricKey::Freq,
    ];

    /// Key used in the published snapshot.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::Ua => "Ua",
            MetricKey::Ub => "Ub",
            MetricKey::Uc => "Uc",
            MetricKey::Uab => "Uab",
            MetricKey::Ubc => "Ubc",
            MetricKey::Uca => "Uca",
            MetricKey::Ia => "Ia",
            MetricKey::Ib => "Ib",
            MetricKey::Ic => "Ic",
            MetricKey::In => "In",
            MetricKey::PFa => "PFa",
            MetricKey::PFb => "PFb",
            MetricKey::PFc => "PFc",
            MetricKey::PF => "PF",
            MetricKey::Freq => "Freq",
        }
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            MetricKey::Ua => "Voltage A",
            MetricKey::Ub => "Voltage B",
            MetricKey::Uc => "Voltage C",
            MetricKey::Uab => "Voltage AB",
            MetricKey::Ubc => "Voltage BC",
            MetricKey::Uca => "Voltage CA",
            MetricKey::Ia => "Current A",
            MetricKey::Ib => "Current B",
            MetricKey::Ic => "Current C",
            MetricKey::In => "Current N",
            MetricKey::PFa => "Power Factor A",
            MetricKey::PFb => "Power Factor B",
            MetricKey::PFc => "Power Factor C",
            MetricKey::PF => "Power Factor Avg",
            MetricKey::Freq => "Frequency",
        }
    }

    pub fn class(self) -> MetricClass {
        match self {
            MetricKey::Ua
            | MetricKey::Ub
            | MetricKey::Uc
            | MetricKey::Uab
            | MetricKey::Ubc
            | MetricKey::Uca => MetricClass::Voltage,
            MetricKey::Ia | MetricKey::Ib | MetricKey::Ic | MetricKey::In => MetricClass::Current,
            MetricKey::PFa | MetricKey::PFb | MetricKey::PFc | MetricKey::PF => {
                MetricClass::PowerFactor
            }
            MetricKey::Freq => MetricClass::Frequency,
        }
    }

    pub fn unit(self) -> &'static str {
        match self.class() {
            MetricClass::Voltage => "V",
            MetricClass::Current => "A",
            MetricClass::PowerFactor => "%",
            MetricClass::Frequency => "Hz",
        }
    }

    pub fn from_key(key: &str) -> Option<MetricKey> {
        MetricKey::ALL.into_iter().find(|k| k.as_str() == key)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model and manufacturer strings reported by the meter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceIdentity {
    pub model: String,
    pub manufacturer: String,
}

/// One consistent set of readings, all taken in the same poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: [f64; MetricKey::COUNT],
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from decoded register blocks.
    ///
    /// `voltages` is the raw voltage block: line-to-line at 0..=2, index 3
    /// reserved, line-to-neutral at 4..=6. `power_factors` are already
    /// normalized percentages.
    pub fn assemble(
        voltages: &[f32; 7],
        currents: &[f32; 4],
        power_factors: &[f64; 4],
        frequency: f32,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let v = |i: usize| f64::from(voltages[i]);
        let i = |n: usize| f64::from(currents[n]);

        let values = [
            v(4),
            v(5),
            v(6),
            v(0),
            v(1),
            v(2),
            i(0),
            i(1),
            i(2),
            i(3),
            power_factors[0],
            power_factors[1],
            power_factors[2],
            power_factors[3],
            f64::from(frequency),
        ];

        Self {
            values,
            captured_at,
        }
    }

    pub fn get(&self, key: MetricKey) -> f64 {
        self.values[key.index()]
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        MetricKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(MetricKey::COUNT + 1))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key.as_str(), &value)?;
        }
        map.serialize_entry("captured_at", &self.captured_at)?;
        map.end()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, (key, value)) in self.iter().enumerate() {
            if n > 0 {
                f.write_str(" ")?;
            }
            write!(
                f,
                "{}={:.prec$}{}",
                key,
                value,
                key.unit(),
                prec = DISPLAY_PRECISION
            )?;
        }
        Ok(())
    }
}
