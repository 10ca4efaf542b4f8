//! Power factor register normalization.
//!
//! The meter encodes the power factor of each phase as a float in `[-2, 2]`
//! so that the quadrant survives the sign. Values beyond `±1` fold back into
//! `[-1, 1]`.

use crate::error::DecodeError;

/// Map a raw power factor register value into `[-1, 1]`.
///
/// Boundaries are checked in this order and are intentionally asymmetric:
///
/// | raw                | result     |
/// |--------------------|------------|
/// | `0 <= r <= 1`      | `r`        |
/// | `-2 <= r <= -1`    | `-2 - r`   |
/// | `-1 < r <= 0`      | `r`        |
/// | `1 < r < 2`        | `2 - r`    |
///
/// Anything else, NaN included, is [`DecodeError::OutOfRange`].
pub fn normalize(raw: f64) -> Result<f64, DecodeError> {
    if (0.0..=1.0).contains(&raw) {
        Ok(raw)
    } else if (-2.0..=-1.0).contains(&raw) {
        Ok(-2.0 - raw)
    } else if raw > -1.0 && raw <= 0.0 {
        Ok(raw)
    } else if raw > 1.0 && raw < 2.0 {
        Ok(2.0 - raw)
    } else {
        Err(DecodeError::OutOfRange(raw))
    }
}

/// Normalized power factor expressed in percent.
pub fn to_percent(raw: f32) -> Result<f64, DecodeError> {
    normalize(f64::from(raw)).map(|pf| pf * 100.0)
}
