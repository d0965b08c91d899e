//! Hit statistics and grade types.
//!
//! This module defines the per-judgment grade labels, the overall session grade
//! and the counters accumulated while a chart is played.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-judgment grade, from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Inside the innermost tenth of the window.
    Perfect,
    /// Just off perfect; scores like a perfect but ends a perfect run.
    Almost,
    Good,
    Ok,
    Bad,
    /// Outside the window, or never pressed.
    Miss,
}

impl Grade {
    /// Every grade, best first.
    pub const ALL: [Grade; 6] = [
        Grade::Perfect,
        Grade::Almost,
        Grade::Good,
        Grade::Ok,
        Grade::Bad,
        Grade::Miss,
    ];

    pub fn is_miss(self) -> bool {
        matches!(self, Grade::Miss)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Grade::Perfect => "perfect",
            Grade::Almost => "almost",
            Grade::Good => "good",
            Grade::Ok => "ok",
            Grade::Bad => "bad",
            Grade::Miss => "miss",
        };
        f.write_str(label)
    }
}

/// Letter grade for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OverallGrade {
    SS,
    S,
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for OverallGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OverallGrade::SS => "SS",
            OverallGrade::S => "S",
            OverallGrade::A => "A",
            OverallGrade::B => "B",
            OverallGrade::C => "C",
            OverallGrade::D => "D",
            OverallGrade::F => "F",
        };
        f.write_str(label)
    }
}

/// Accumulated grade counts for a play session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitStats {
    pub perfect: u32,
    pub almost: u32,
    pub good: u32,
    pub ok: u32,
    pub bad: u32,
    pub miss: u32,
    /// Key presses that reached no live object (not counted as judgments).
    pub ghost_tap: u32,
}

impl HitStats {
    /// Creates empty hit statistics.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, grade: Grade) {
        match grade {
            Grade::Perfect => self.perfect += 1,
            Grade::Almost => self.almost += 1,
            Grade::Good => self.good += 1,
            Grade::Ok => self.ok += 1,
            Grade::Bad => self.bad += 1,
            Grade::Miss => self.miss += 1,
        }
    }

    pub fn count(&self, grade: Grade) -> u32 {
        match grade {
            Grade::Perfect => self.perfect,
            Grade::Almost => self.almost,
            Grade::Good => self.good,
            Grade::Ok => self.ok,
            Grade::Bad => self.bad,
            Grade::Miss => self.miss,
        }
    }

    /// Number of judgments recorded (ghost taps excluded).
    pub fn judged(&self) -> u32 {
        Grade::ALL.iter().map(|g| self.count(*g)).sum()
    }
}
