//! Chart input types: raw notes, timing parameters and their validation.
//!
//! A chart arrives from the loader as a flat list of notes plus the global
//! timing values. Everything here is checked once, when the chart is built;
//! nothing in this module can fail mid-session.

use super::timing::validate_parameters;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a physical key, as reported by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeySymbol(pub u32);

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key#{}", self.0)
    }
}

/// Type of note in a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    /// Single press.
    Tap,
    /// Press on entry, release on the second timestamp.
    Hold,
}

impl NoteKind {
    /// Number of timestamps, symbols and presses this kind requires.
    pub fn required_count(self) -> usize {
        match self {
            NoteKind::Tap => 1,
            NoteKind::Hold => 2,
        }
    }
}

/// Error type for charts rejected at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartError {
    /// BPM is not a finite positive number.
    InvalidBpm(f64),
    /// Approach rate outside `[0, 10]`.
    InvalidApproachRate(f64),
    /// Wrong number of timestamps or symbols for the note kind.
    Arity {
        kind: NoteKind,
        timestamps: usize,
        symbols: usize,
    },
    /// A hold whose release comes before its entry.
    UnorderedHold { entry: f64, release: f64 },
    /// NaN or infinite timestamp.
    NonFiniteTimestamp(f64),
    /// Symbol generation was asked to pick from an empty pool.
    EmptySymbolPool,
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::InvalidBpm(bpm) => write!(f, "Invalid BPM: {}", bpm),
            ChartError::InvalidApproachRate(ar) => {
                write!(f, "Approach rate {} is outside [0, 10]", ar)
            }
            ChartError::Arity {
                kind,
                timestamps,
                symbols,
            } => write!(
                f,
                "{:?} note needs {} timestamp(s) and symbol(s), got {} and {}",
                kind,
                kind.required_count(),
                timestamps,
                symbols
            ),
            ChartError::UnorderedHold { entry, release } => {
                write!(f, "Hold released at {} before its entry at {}", release, entry)
            }
            ChartError::NonFiniteTimestamp(t) => write!(f, "Non-finite timestamp: {}", t),
            ChartError::EmptySymbolPool => write!(f, "No key symbols to assign notes to"),
        }
    }
}

impl std::error::Error for ChartError {}

/// A single note as produced by the chart loader (times in seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawNote {
    Tap {
        timestamp: f64,
        symbol: KeySymbol,
    },
    Hold {
        /// Entry and release.
        timestamps: [f64; 2],
        /// Entry and release.
        symbols: [KeySymbol; 2],
    },
}

impl RawNote {
    /// Creates a tap note.
    pub fn tap(timestamp: f64, symbol: KeySymbol) -> Self {
        RawNote::Tap { timestamp, symbol }
    }

    /// Creates a hold note pressed and released on the same key.
    pub fn hold(entry: f64, release: f64, symbol: KeySymbol) -> Self {
        RawNote::Hold {
            timestamps: [entry, release],
            symbols: [symbol, symbol],
        }
    }

    /// Builds a note from loader slices, checking arity against the kind.
    pub fn from_parts(
        kind: NoteKind,
        timestamps: &[f64],
        symbols: &[KeySymbol],
    ) -> Result<Self, ChartError> {
        let arity_error = || ChartError::Arity {
            kind,
            timestamps: timestamps.len(),
            symbols: symbols.len(),
        };

        let note = match (kind, timestamps, symbols) {
            (NoteKind::Tap, &[timestamp], &[symbol]) => RawNote::Tap { timestamp, symbol },
            (NoteKind::Hold, &[entry, release], &[press, lift]) => RawNote::Hold {
                timestamps: [entry, release],
                symbols: [press, lift],
            },
            _ => return Err(arity_error()),
        };
        note.validate()?;
        Ok(note)
    }

    pub fn kind(&self) -> NoteKind {
        match self {
            RawNote::Tap { .. } => NoteKind::Tap,
            RawNote::Hold { .. } => NoteKind::Hold,
        }
    }

    pub fn timestamps(&self) -> &[f64] {
        match self {
            RawNote::Tap { timestamp, .. } => std::slice::from_ref(timestamp),
            RawNote::Hold { timestamps, .. } => timestamps,
        }
    }

    pub fn symbols(&self) -> &[KeySymbol] {
        match self {
            RawNote::Tap { symbol, .. } => std::slice::from_ref(symbol),
            RawNote::Hold { symbols, .. } => symbols,
        }
    }

    /// Checks timestamp ordering and finiteness.
    pub fn validate(&self) -> Result<(), ChartError> {
        if let Some(&bad) = self.timestamps().iter().find(|t| !t.is_finite()) {
            return Err(ChartError::NonFiniteTimestamp(bad));
        }
        if let RawNote::Hold {
            timestamps: [entry, release],
            ..
        } = self
        {
            if release < entry {
                return Err(ChartError::UnorderedHold {
                    entry: *entry,
                    release: *release,
                });
            }
        }
        Ok(())
    }
}

/// Global timing values of a chart, read once per session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartTiming {
    pub bpm: f64,
    pub approach_rate: f64,
    /// Carried for collaborators; judgment uses the configured hit window.
    pub overall_difficulty: f64,
}

impl ChartTiming {
    pub fn new(bpm: f64, approach_rate: f64, overall_difficulty: f64) -> Result<Self, ChartError> {
        validate_parameters(bpm, approach_rate)?;
        Ok(Self {
            bpm,
            approach_rate,
            overall_difficulty,
        })
    }
}

/// A validated chart ready to be turned into hit objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub timing: ChartTiming,
    pub notes: Vec<RawNote>,
}

impl Chart {
    /// Validates every note and sorts them by first timestamp.
    pub fn new(timing: ChartTiming, mut notes: Vec<RawNote>) -> Result<Self, ChartError> {
        validate_parameters(timing.bpm, timing.approach_rate)?;
        for note in &notes {
            note.validate()?;
        }
        notes.sort_by(|a, b| a.timestamps()[0].total_cmp(&b.timestamps()[0]));
        Ok(Self { timing, notes })
    }

    /// Builds a tap-only chart from bare hit times, spreading notes over `pool`.
    ///
    /// Symbols are drawn from shuffled batches of the pool with an RNG seeded by
    /// `seed`, so the same inputs always produce the same chart. A symbol is only
    /// reused once more than `min_reuse_gap` seconds have passed since its last
    /// note; `GameplaySettings::symbol_reuse_gap` is the gap that keeps two notes
    /// of one key from being live together.
    pub fn with_generated_symbols(
        timing: ChartTiming,
        timestamps: &[f64],
        pool: &[KeySymbol],
        seed: u64,
        min_reuse_gap: f64,
    ) -> Result<Self, ChartError> {
        if pool.is_empty() {
            return Err(ChartError::EmptySymbolPool);
        }

        let mut times = timestamps.to_vec();
        times.sort_by(f64::total_cmp);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut batch: Vec<KeySymbol> = Vec::with_capacity(pool.len());
        let mut last_used: HashMap<KeySymbol, f64> = HashMap::new();
        let mut notes = Vec::with_capacity(times.len());

        for timestamp in times {
            if batch.is_empty() {
                batch.extend_from_slice(pool);
                batch.shuffle(&mut rng);
            }

            let is_free = |symbol: &KeySymbol| {
                last_used
                    .get(symbol)
                    .is_none_or(|&last| timestamp - last > min_reuse_gap)
            };
            let symbol = match batch.iter().rposition(|s| is_free(s)) {
                Some(i) => batch.remove(i),
                None => {
                    // Rest of the batch is busy: take the key idle the longest.
                    let idle = |s: &KeySymbol| last_used.get(s).copied().unwrap_or(f64::NEG_INFINITY);
                    let Some(symbol) = pool
                        .iter()
                        .copied()
                        .min_by(|a, b| idle(a).total_cmp(&idle(b)))
                    else {
                        return Err(ChartError::EmptySymbolPool);
                    };
                    if !is_free(&symbol) {
                        log::warn!(
                            "CHART: No free key at {:.3}s with {} keys, reusing {}",
                            timestamp,
                            pool.len(),
                            symbol
                        );
                    }
                    batch.retain(|&s| s != symbol);
                    symbol
                }
            };

            last_used.insert(symbol, timestamp);
            notes.push(RawNote::tap(timestamp, symbol));
        }

        Self::new(timing, notes)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Last judgment time in the chart (end of a final hold included).
    pub fn end_time(&self) -> Option<f64> {
        self.notes
            .iter()
            .filter_map(|n| n.timestamps().last().copied())
            .reduce(f64::max)
    }
}
