//! Authoritative game time and frame-rate bookkeeping.
//!
//! Game time is the playing track's position: the clock never runs its own
//! timer once playback has started, it only asks its position source.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of the playing track's position.
pub trait PlaybackPosition {
    /// Current position in seconds.
    fn position_seconds(&self) -> f64;

    /// Called when the clock starts; sources that measure elapsed time anchor here.
    fn start(&mut self) {}
}

/// Reads a sample counter written by the audio thread.
#[derive(Clone)]
pub struct SharedPosition {
    position: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU64>,
    channels: Arc<AtomicU64>,
}

impl SharedPosition {
    pub fn new(
        position: Arc<AtomicU64>,
        sample_rate: Arc<AtomicU64>,
        channels: Arc<AtomicU64>,
    ) -> Self {
        Self {
            position,
            sample_rate,
            channels,
        }
    }
}

impl PlaybackPosition for SharedPosition {
    fn position_seconds(&self) -> f64 {
        let samples = self.position.load(Ordering::Acquire) as f64;
        let rate = self.sample_rate.load(Ordering::Relaxed).max(1) as f64;
        let channels = self.channels.load(Ordering::Relaxed).max(1) as f64;
        samples / (rate * channels)
    }
}

/// Wall-clock seconds since `start`, for sessions with no audio attached.
#[derive(Debug, Default, Clone)]
pub struct ElapsedPosition {
    started_at: Option<Instant>,
}

impl PlaybackPosition for ElapsedPosition {
    fn position_seconds(&self) -> f64 {
        self.started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }
}

/// Position set explicitly by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualPosition {
    seconds: f64,
}

impl ManualPosition {
    pub fn set(&mut self, seconds: f64) {
        self.seconds = seconds;
    }

    pub fn advance(&mut self, seconds: f64) {
        self.seconds += seconds;
    }
}

impl PlaybackPosition for ManualPosition {
    fn position_seconds(&self) -> f64 {
        self.seconds
    }
}

pub struct TimingClock<P: PlaybackPosition> {
    source: P,
    started: bool,
    frame_times: VecDeque<f64>,
    max_frames: usize,
    dt: f64,
}

impl<P: PlaybackPosition> TimingClock<P> {
    /// Default number of frames averaged by `fps`.
    pub const DEFAULT_WINDOW: usize = 60;

    pub fn new(source: P) -> Self {
        Self::with_window(source, Self::DEFAULT_WINDOW)
    }

    pub fn with_window(source: P, max_frames: usize) -> Self {
        let max_frames = max_frames.max(1);
        Self {
            source,
            started: false,
            frame_times: VecDeque::with_capacity(max_frames),
            max_frames,
            dt: 0.0,
        }
    }

    /// Marks playback as begun; `now` follows the source from here on.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.source.start();
        self.started = true;
        log::info!("CLOCK: Started");
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Current game time in seconds, `0` before `start`.
    pub fn now(&self) -> f64 {
        if self.started {
            self.source.position_seconds()
        } else {
            0.0
        }
    }

    /// Records one frame of known duration.
    pub fn tick_with(&mut self, dt: f64) {
        self.dt = dt;
        if self.frame_times.len() == self.max_frames {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);
    }

    /// Duration of the last frame.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Average frames per second over the trailing window.
    pub fn fps(&self) -> f64 {
        let total: f64 = self.frame_times.iter().sum();
        if total == 0.0 {
            return 0.0;
        }
        self.frame_times.len() as f64 / total
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut P {
        &mut self.source
    }
}

/// Formats seconds as `hh:mm:ss.mmm`.
pub fn format_timestamp(seconds: f64) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total_ms = (seconds.abs() * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{sign}{h:02}:{m:02}:{s:02}.{ms:03}")
}
