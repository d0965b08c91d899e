//! Timing window and grade thresholds.
//!
//! Every threshold is expressed relative to a single half width: a deviation
//! is first normalized to `[-1, 1]`, then graded on its absolute value.

use crate::models::stats::Grade;
use serde::{Deserialize, Serialize};

/// Lower bounds on `|normalized|` for each non-perfect grade.
///
/// Evaluated worst first; anything below `almost` is a perfect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub bad: f64,
    pub ok: f64,
    pub good: f64,
    pub almost: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            bad: 0.5,
            ok: 0.3,
            good: 0.2,
            almost: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitWindow {
    /// Deviation (seconds) that saturates the normalized accuracy.
    pub half_width: f64,
    /// Time after the final judgment time before an unresolved object is missed.
    pub grace_period: f64,
    pub thresholds: GradeThresholds,
}

impl Default for HitWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl HitWindow {
    /// Default window: 0.5 s half width, 0.2 s grace.
    pub fn new() -> Self {
        Self {
            half_width: 0.5,
            grace_period: 0.2,
            thresholds: GradeThresholds::default(),
        }
    }

    /// Utility constructor for fully custom values.
    pub fn from_custom(half_width: f64, grace_period: f64, thresholds: GradeThresholds) -> Self {
        Self {
            half_width,
            grace_period,
            thresholds,
        }
    }

    /// Maps a signed deviation in seconds to `[-1, 1]`.
    pub fn normalize(&self, deviation: f64) -> f64 {
        (deviation / self.half_width).clamp(-1.0, 1.0)
    }

    /// Grades a normalized deviation, first match wins.
    pub fn grade(&self, normalized: f64) -> Grade {
        let abs = normalized.abs();
        let t = &self.thresholds;

        if abs >= 1.0 {
            Grade::Miss
        } else if abs >= t.bad {
            Grade::Bad
        } else if abs >= t.ok {
            Grade::Ok
        } else if abs >= t.good {
            Grade::Good
        } else if abs >= t.almost {
            Grade::Almost
        } else {
            Grade::Perfect
        }
    }

    /// Normalizes and grades in one step.
    pub fn judge(&self, deviation: f64) -> (Grade, f64) {
        let normalized = self.normalize(deviation);
        (self.grade(normalized), normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_bands() {
        let window = HitWindow::new();
        assert_eq!(window.judge(0.0).0, Grade::Perfect);
        assert_eq!(window.judge(0.04).0, Grade::Perfect);
        assert_eq!(window.judge(-0.06).0, Grade::Almost);
        assert_eq!(window.judge(0.12).0, Grade::Good);
        assert_eq!(window.judge(-0.2).0, Grade::Ok);
        assert_eq!(window.judge(0.3).0, Grade::Bad);
        assert_eq!(window.judge(0.49).0, Grade::Bad);
        assert_eq!(window.judge(0.5).0, Grade::Miss);
        assert_eq!(window.judge(-3.0).0, Grade::Miss);
    }

    #[test]
    fn test_normalize_clamps() {
        let window = HitWindow::new();
        assert_eq!(window.normalize(2.0), 1.0);
        assert_eq!(window.normalize(-2.0), -1.0);
        assert!((window.normalize(0.3) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_custom_half_width_scales_bands() {
        let window = HitWindow::from_custom(0.1, 0.05, GradeThresholds::default());
        // 0.03 s is 0.3 of a 0.1 s window
        assert_eq!(window.judge(0.031).0, Grade::Ok);
        assert_eq!(window.judge(0.1).0, Grade::Miss);
    }
}
