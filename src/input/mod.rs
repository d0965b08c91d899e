//! Input-side types shared with the logic thread.

pub mod events;
