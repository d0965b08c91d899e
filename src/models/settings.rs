//! Gameplay balance settings, loadable from TOML.
//!
//! Every field has a default, so a settings file only needs to list what it
//! overrides.

use crate::models::engine::{ApproachCurve, ChartTiming, HitWindow};
use crate::models::stats::Grade;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Points awarded per grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTable {
    pub perfect: u64,
    pub almost: u64,
    pub good: u64,
    pub ok: u64,
    pub bad: u64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            perfect: 300,
            almost: 300,
            good: 200,
            ok: 100,
            bad: 50,
        }
    }
}

impl ScoreTable {
    pub fn points(&self, grade: Grade) -> u64 {
        match grade {
            Grade::Perfect => self.perfect,
            Grade::Almost => self.almost,
            Grade::Good => self.good,
            Grade::Ok => self.ok,
            Grade::Bad => self.bad,
            Grade::Miss => 0,
        }
    }
}

/// Extra points for long combos: `floor(combo / every) * points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboBonus {
    pub every: u32,
    pub points: u64,
}

impl Default for ComboBonus {
    fn default() -> Self {
        Self {
            every: 10,
            points: 80,
        }
    }
}

impl ComboBonus {
    pub fn for_combo(&self, combo: u32) -> u64 {
        if self.every == 0 {
            return 0;
        }
        u64::from(combo / self.every) * self.points
    }
}

/// Minimum overall accuracy for each letter below S.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverallThresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for OverallThresholds {
    fn default() -> Self {
        Self {
            a: 0.8,
            b: 0.7,
            c: 0.6,
            d: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    /// Capacity of the rolling accuracy window.
    pub recent_accuracy_len: usize,
    /// Number of frames averaged for the fps readout.
    pub fps_window: usize,
    pub hit_window: HitWindow,
    pub approach: ApproachCurve,
    pub score: ScoreTable,
    /// Disabled unless configured.
    pub combo_bonus: Option<ComboBonus>,
    pub overall: OverallThresholds,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl GameplaySettings {
    pub fn new() -> Self {
        Self {
            recent_accuracy_len: 20,
            fps_window: 60,
            hit_window: HitWindow::new(),
            approach: ApproachCurve::default(),
            score: ScoreTable::default(),
            combo_bonus: None,
            overall: OverallThresholds::default(),
        }
    }

    /// Smallest spacing between two notes of one key that never has both live
    /// at once: the approach window plus the grace period.
    pub fn symbol_reuse_gap(&self, timing: &ChartTiming) -> f64 {
        self.approach
            .approach_window(timing.bpm, timing.approach_rate)
            + self.hit_window.grace_period
    }

    /// Reads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        load_toml(path)
    }

    /// Reads settings from `path`, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("SETTINGS: {:?} not found, using defaults", path);
            return Self::new();
        }
        match Self::load(path) {
            Ok(settings) => {
                log::info!("SETTINGS: Loaded {:?}", path);
                settings
            }
            Err(e) => {
                log::warn!("SETTINGS: Falling back to defaults: {}", e);
                Self::new()
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

/// Load a TOML file and deserialize it
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    match toml::from_str(&content) {
        Ok(data) => Ok(data),
        Err(e) => {
            log::error!("Failed to parse TOML file {:?}: {}", path, e);
            Err(e.to_string())
        }
    }
}
