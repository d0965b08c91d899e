pub mod hit_object;
pub mod hit_window;
pub mod note;
pub mod timing;

pub use hit_object::{HitObject, HitState, NotPressable, PressOutcome};
pub use hit_window::{GradeThresholds, HitWindow};
pub use note::{Chart, ChartError, ChartTiming, KeySymbol, NoteKind, RawNote};
pub use timing::{ApproachCurve, derive_times};
