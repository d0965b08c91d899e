use crate::models::engine::KeySymbol;

/// A key transition stamped with the game time it happened at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub symbol: KeySymbol,
    /// Game time in seconds.
    pub time: f64,
    pub is_down: bool,
}

impl KeyEvent {
    pub fn down(symbol: KeySymbol, time: f64) -> Self {
        Self {
            symbol,
            time,
            is_down: true,
        }
    }

    pub fn up(symbol: KeySymbol, time: f64) -> Self {
        Self {
            symbol,
            time,
            is_down: false,
        }
    }
}
