//! Shared channel infrastructure between threads.
//!
//! The `SystemBus` is the communication hub between the input side, the
//! logic thread and whoever consumes snapshots, using lock-free channels.

use crate::input::events::KeyEvent;
use crate::logic::clock::SharedPosition;
use crate::shared::snapshot::{GameplaySnapshot, SessionResult};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// System-level events sent to the logic thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    /// Start the session clock.
    Start,
    /// Stop the session and publish its result.
    Quit,
}

/// Aggregates the cross-thread communication channels.
#[derive(Clone)]
pub struct SystemBus {
    /// Input → Logic: timestamped key transitions.
    pub key_tx: Sender<KeyEvent>,
    pub key_rx: Receiver<KeyEvent>,

    /// Logic → Display: gameplay snapshots.
    pub snapshot_tx: Sender<GameplaySnapshot>,
    pub snapshot_rx: Receiver<GameplaySnapshot>,

    /// Logic → Main: final result, sent once.
    pub result_tx: Sender<SessionResult>,
    pub result_rx: Receiver<SessionResult>,

    /// Main → Logic: system events.
    pub sys_tx: Sender<SystemEvent>,
    pub sys_rx: Receiver<SystemEvent>,

    /// Playback position in samples.
    /// Written by the audio side, read by the logic thread.
    pub audio_position: Arc<AtomicU64>,

    /// Current audio sample rate.
    pub audio_sample_rate: Arc<AtomicU64>,

    /// Number of audio channels.
    pub audio_channels: Arc<AtomicU64>,
}

impl SystemBus {
    /// Creates a new system bus with all channels initialized.
    pub fn new() -> Self {
        let (key_tx, key_rx) = unbounded();

        // Bounded snapshot channel: max 2 frames queued to limit latency
        let (snapshot_tx, snapshot_rx) = bounded(2);

        let (result_tx, result_rx) = bounded(1);
        let (sys_tx, sys_rx) = unbounded();

        Self {
            key_tx,
            key_rx,
            snapshot_tx,
            snapshot_rx,
            result_tx,
            result_rx,
            sys_tx,
            sys_rx,
            audio_position: Arc::new(AtomicU64::new(0)),
            audio_sample_rate: Arc::new(AtomicU64::new(44100)),
            audio_channels: Arc::new(AtomicU64::new(2)),
        }
    }

    /// Position source reading this bus's audio counters.
    pub fn playback_position(&self) -> SharedPosition {
        SharedPosition::new(
            self.audio_position.clone(),
            self.audio_sample_rate.clone(),
            self.audio_channels.clone(),
        )
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}
