//! Checked numeric conversions for pixel coordinates and percentages

use crate::{Error, Result};

/// Round an f64 to the nearest i32, rejecting non-finite or out-of-range values
///
/// # Errors
///
/// Returns an error if the rounded value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f64_round_to_i32(value: f64) -> Result<i32> {
    let rounded = value.round();
    if rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX) {
        Ok(rounded as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Truncate a probability to a whole percentage in `[0, 100]`
///
/// Non-finite input maps to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped to [0, 100] first
pub fn probability_to_percent(probability: f32) -> u8 {
    if !probability.is_finite() {
        return 0;
    }
    (f64::from(probability.clamp(0.0, 1.0)) * 100.0).floor() as u8
}
