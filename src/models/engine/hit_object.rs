//! Per-note runtime entity and its lifecycle state machine.
//!
//! `Inactive -> Active -> Passed`, never backwards. Promotion to `Active` is
//! driven by the dispatcher; `Passed` is reached either through `press` or by
//! the dispatcher forcing an overdue object.

use super::note::{ChartError, KeySymbol, NoteKind, RawNote};
use super::timing::ApproachCurve;
use crate::models::stats::Grade;
use std::fmt;

/// Lifecycle state of a hit object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitState {
    /// Not yet reachable by the player.
    Inactive,
    /// Live and accepting presses.
    Active,
    /// Fully resolved (pressed out or forced).
    Passed,
}

/// Result of an accepted `press` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// Object was still inactive; nothing recorded.
    Ignored,
    /// Press recorded, more are required.
    Recorded,
    /// Press recorded and the object is now `Passed`.
    Passed,
}

/// The object was already resolved when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotPressable;

impl fmt::Display for NotPressable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hit object is not pressable")
    }
}

impl std::error::Error for NotPressable {}

#[derive(Debug, Clone)]
pub struct HitObject {
    kind: NoteKind,
    judgment_times: Vec<f64>,
    lead_in_times: Vec<f64>,
    press_times: Vec<f64>,
    symbols: Vec<KeySymbol>,
    grades: Vec<Grade>,
    state: HitState,
}

impl HitObject {
    /// Derives judgment and lead-in times for every timestamp of `note`.
    pub fn new(
        note: &RawNote,
        bpm: f64,
        approach_rate: f64,
        curve: &ApproachCurve,
    ) -> Result<Self, ChartError> {
        note.validate()?;

        let mut judgment_times = Vec::with_capacity(note.timestamps().len());
        let mut lead_in_times = Vec::with_capacity(note.timestamps().len());
        for &raw in note.timestamps() {
            let (judgment, lead_in) = curve.derive_times(raw, bpm, approach_rate)?;
            judgment_times.push(judgment);
            lead_in_times.push(lead_in);
        }

        let kind = note.kind();
        Ok(Self {
            kind,
            judgment_times,
            lead_in_times,
            press_times: Vec::with_capacity(kind.required_count()),
            symbols: note.symbols().to_vec(),
            grades: Vec::with_capacity(kind.required_count()),
            state: HitState::Inactive,
        })
    }

    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    pub fn state(&self) -> HitState {
        self.state
    }

    pub fn judgment_times(&self) -> &[f64] {
        &self.judgment_times
    }

    pub fn lead_in_times(&self) -> &[f64] {
        &self.lead_in_times
    }

    pub fn press_times(&self) -> &[f64] {
        &self.press_times
    }

    pub fn grades(&self) -> &[Grade] {
        &self.grades
    }

    /// Number of presses needed to resolve the object.
    pub fn required_count(&self) -> usize {
        self.kind.required_count()
    }

    /// Instant the object becomes live.
    pub fn lead_in(&self) -> f64 {
        self.lead_in_times[0]
    }

    /// Last instant the object must be acted upon.
    pub fn final_judgment_time(&self) -> f64 {
        self.judgment_times[self.judgment_times.len() - 1]
    }

    /// Key that presses this object.
    pub fn symbol(&self) -> KeySymbol {
        self.symbols[0]
    }

    /// Key whose release completes a hold (same as `symbol` for taps).
    pub fn release_symbol(&self) -> KeySymbol {
        self.symbols[self.symbols.len() - 1]
    }

    /// Judgment times in integer milliseconds, for display layers.
    pub fn judgment_times_ms(&self) -> Vec<i64> {
        self.judgment_times
            .iter()
            .map(|t| (t * 1000.0).round() as i64)
            .collect()
    }

    pub(crate) fn activate(&mut self) {
        if self.state == HitState::Inactive {
            self.state = HitState::Active;
        }
    }

    /// Resolves the object without further presses.
    pub(crate) fn force_pass(&mut self) {
        self.state = HitState::Passed;
    }

    /// Records a press at `time`.
    ///
    /// Presses on an inactive object are dropped; presses on a passed object fail
    /// so the caller can clear its binding.
    pub fn press(&mut self, time: f64) -> Result<PressOutcome, NotPressable> {
        match self.state {
            HitState::Inactive => Ok(PressOutcome::Ignored),
            HitState::Passed => Err(NotPressable),
            HitState::Active => {
                self.press_times.push(time);
                if self.press_times.len() == self.required_count() {
                    self.state = HitState::Passed;
                    Ok(PressOutcome::Passed)
                } else {
                    Ok(PressOutcome::Recorded)
                }
            }
        }
    }

    /// Signed press deviation for judgment `index` (negative = early).
    ///
    /// `None` until the object has passed, or when that judgment was never pressed.
    pub fn deviation_for(&self, index: usize) -> Option<f64> {
        if self.state != HitState::Passed {
            return None;
        }
        let press = self.press_times.get(index)?;
        Some(press - self.judgment_times[index])
    }

    pub fn add_grade(&mut self, grade: Grade) {
        if self.grades.len() < self.required_count() {
            self.grades.push(grade);
        } else {
            log::warn!(
                "ENGINE: {} over grade capacity, dropped {}",
                self.symbol(),
                grade
            );
        }
    }
}
