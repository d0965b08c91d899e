//! Snapshots for inter-thread communication.
//!
//! Snapshots are immutable captures of a session sent from the logic thread
//! to whoever displays it. The final `SessionResult` is serializable so it can
//! be stored or printed.

use crate::logic::dispatcher::DispatchEvent;
use crate::models::engine::{HitObject, KeySymbol, NoteKind};
use crate::models::stats::{Grade, HitStats, OverallGrade};
use serde::{Deserialize, Serialize};

/// A live object as seen by a display layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveNoteView {
    /// Index in the chart.
    pub index: usize,
    pub kind: NoteKind,
    pub symbol: KeySymbol,
    pub judgment_times: Vec<f64>,
    /// Fraction of the approach elapsed, `1.0` at the first judgment time.
    pub approach: f64,
    /// Presses recorded so far.
    pub presses: usize,
}

impl LiveNoteView {
    pub fn new(index: usize, object: &HitObject, now: f64) -> Self {
        let start = object.lead_in();
        let end = object.judgment_times()[0];
        let approach = if end > start {
            ((now - start) / (end - start)).max(0.0)
        } else {
            1.0
        };

        Self {
            index,
            kind: object.kind(),
            symbol: object.symbol(),
            judgment_times: object.judgment_times().to_vec(),
            approach,
            presses: object.press_times().len(),
        }
    }
}

/// Snapshot of gameplay state.
#[derive(Clone, Debug)]
pub struct GameplaySnapshot {
    /// Game time in seconds.
    pub time: f64,
    /// Game time as `hh:mm:ss.mmm`.
    pub time_label: String,
    pub fps: f64,

    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
    pub grade: OverallGrade,
    pub hit_stats: HitStats,
    /// Rolling normalized deviations, oldest first.
    pub recent_accuracy: Vec<f64>,

    /// Last grade (for flash display).
    pub last_grade: Option<Grade>,
    /// Last press deviation in seconds.
    pub last_deviation: Option<f64>,

    pub live_notes: Vec<LiveNoteView>,
    /// Objects not yet resolved.
    pub remaining_notes: usize,
    /// Transitions of the last tick, for animation triggers.
    pub events: Vec<DispatchEvent>,
}

/// Per-note outcome in the final result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub kind: NoteKind,
    pub judgment_times_ms: Vec<i64>,
    pub press_times: Vec<f64>,
    pub grades: Vec<Grade>,
}

impl From<&HitObject> for NoteResult {
    fn from(object: &HitObject) -> Self {
        Self {
            kind: object.kind(),
            judgment_times_ms: object.judgment_times_ms(),
            press_times: object.press_times().to_vec(),
            grades: object.grades().to_vec(),
        }
    }
}

/// Final summary of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: u64,
    pub max_combo: u32,
    pub combo_history: Vec<u32>,
    pub accuracy: f64,
    pub grade: OverallGrade,
    pub is_perfect_run: bool,
    pub has_no_misses: bool,
    pub hit_stats: HitStats,
    /// Game time at which the result was taken, `hh:mm:ss.mmm`.
    pub duration: String,
    /// True when every object was resolved.
    pub completed: bool,
    pub notes: Vec<NoteResult>,
}
