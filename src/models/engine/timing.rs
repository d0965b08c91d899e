//! Conversion from raw chart timestamps to judgment and lead-in times.

use super::note::ChartError;
use serde::{Deserialize, Serialize};

/// Upper bound of the approach rate scale.
pub const MAX_APPROACH_RATE: f64 = 10.0;

/// Coefficients of the lead-in window formula.
///
/// `window = beat * (1 + (ceiling - ar / ar_divisor) / span_divisor)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproachCurve {
    pub ceiling: f64,
    pub ar_divisor: f64,
    pub span_divisor: f64,
}

impl Default for ApproachCurve {
    fn default() -> Self {
        Self {
            ceiling: 10.0,
            ar_divisor: 3.0,
            span_divisor: 3.0,
        }
    }
}

impl ApproachCurve {
    /// Seconds between an object becoming live and its judgment time.
    ///
    /// Strictly decreasing in `approach_rate` for positive divisors.
    pub fn approach_window(&self, bpm: f64, approach_rate: f64) -> f64 {
        let beat_seconds = 60.0 / bpm;
        beat_seconds * (1.0 + (self.ceiling - approach_rate / self.ar_divisor) / self.span_divisor)
    }

    /// Returns `(judgment_time, lead_in_time)` for one raw timestamp.
    pub fn derive_times(
        &self,
        raw_timestamp: f64,
        bpm: f64,
        approach_rate: f64,
    ) -> Result<(f64, f64), ChartError> {
        validate_parameters(bpm, approach_rate)?;
        let judgment_time = raw_timestamp;
        let lead_in_time = judgment_time - self.approach_window(bpm, approach_rate);
        Ok((judgment_time, lead_in_time))
    }
}

/// Rejects parameters the approach formula is not defined for.
pub fn validate_parameters(bpm: f64, approach_rate: f64) -> Result<(), ChartError> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(ChartError::InvalidBpm(bpm));
    }
    if !(0.0..=MAX_APPROACH_RATE).contains(&approach_rate) {
        return Err(ChartError::InvalidApproachRate(approach_rate));
    }
    Ok(())
}

/// [`ApproachCurve::derive_times`] with the default coefficients.
pub fn derive_times(
    raw_timestamp: f64,
    bpm: f64,
    approach_rate: f64,
) -> Result<(f64, f64), ChartError> {
    ApproachCurve::default().derive_times(raw_timestamp, bpm, approach_rate)
}
