//! One play of a chart: clock, scheduler and scorer owned together.

use crate::input::events::KeyEvent;
use crate::logic::clock::{PlaybackPosition, TimingClock, format_timestamp};
use crate::logic::dispatcher::{DispatchEvent, Dispatcher};
use crate::logic::judgment::JudgmentEngine;
use crate::models::engine::{Chart, ChartError};
use crate::models::settings::GameplaySettings;
use crate::shared::snapshot::{GameplaySnapshot, LiveNoteView, NoteResult, SessionResult};
use std::collections::VecDeque;

pub struct Session<P: PlaybackPosition> {
    clock: TimingClock<P>,
    dispatcher: Dispatcher,
    engine: JudgmentEngine,
    settings: GameplaySettings,
    queued_input: VecDeque<KeyEvent>,
    last_events: Vec<DispatchEvent>,
}

impl<P: PlaybackPosition> Session<P> {
    pub fn new(chart: &Chart, settings: GameplaySettings, source: P) -> Result<Self, ChartError> {
        let dispatcher = Dispatcher::new(chart, &settings)?;
        let engine = JudgmentEngine::new(&settings);
        let clock = TimingClock::with_window(source, settings.fps_window);

        log::info!(
            "SESSION: {} notes at {} bpm, ar {}",
            chart.len(),
            chart.timing.bpm,
            chart.timing.approach_rate
        );

        Ok(Self {
            clock,
            dispatcher,
            engine,
            settings,
            queued_input: VecDeque::new(),
            last_events: Vec::new(),
        })
    }

    pub fn start(&mut self) {
        self.clock.start();
    }

    /// Queues a key event for the next tick.
    pub fn queue_input(&mut self, event: KeyEvent) {
        self.queued_input.push_back(event);
    }

    /// Advances one frame of known duration.
    pub fn tick_with(&mut self, dt: f64) -> &[DispatchEvent] {
        self.clock.tick_with(dt);
        self.step()
    }

    fn step(&mut self) -> &[DispatchEvent] {
        let now = self.clock.now();
        let mut events = self.dispatcher.tick(now, &mut self.engine);

        for input in self.queued_input.drain(..) {
            if input.is_down {
                events.extend(
                    self.dispatcher
                        .key_down(input.symbol, input.time, &mut self.engine),
                );
            } else if let Some(event) =
                self.dispatcher
                    .key_up(input.symbol, input.time, &mut self.engine)
            {
                events.push(event);
            }
        }

        for event in &events {
            log::debug!("SESSION: {:?}", event);
        }
        self.last_events = events;
        &self.last_events
    }

    pub fn is_finished(&self) -> bool {
        self.dispatcher.is_finished()
    }

    pub fn snapshot(&self) -> GameplaySnapshot {
        let now = self.clock.now();
        let engine = &self.engine;
        let last = engine.last_judgment();

        GameplaySnapshot {
            time: now,
            time_label: format_timestamp(now),
            fps: self.clock.fps(),
            score: engine.score(),
            combo: engine.combo(),
            max_combo: engine.max_combo(),
            accuracy: engine.overall_accuracy(),
            grade: engine.overall_grade(),
            hit_stats: engine.hit_stats().clone(),
            recent_accuracy: engine.recent_accuracies().collect(),
            last_grade: last.map(|j| j.grade),
            last_deviation: last.and_then(|j| j.deviation),
            live_notes: self
                .dispatcher
                .live_objects()
                .map(|(index, object)| LiveNoteView::new(index, object, now))
                .collect(),
            remaining_notes: self.dispatcher.remaining(),
            events: self.last_events.clone(),
        }
    }

    pub fn result(&self) -> SessionResult {
        let engine = &self.engine;
        SessionResult {
            score: engine.score(),
            max_combo: engine.max_combo(),
            combo_history: engine.combo_history().to_vec(),
            accuracy: engine.overall_accuracy(),
            grade: engine.overall_grade(),
            is_perfect_run: engine.is_perfect_run(),
            has_no_misses: engine.has_no_misses(),
            hit_stats: engine.hit_stats().clone(),
            duration: format_timestamp(self.clock.now()),
            completed: self.is_finished(),
            notes: self
                .dispatcher
                .objects()
                .iter()
                .map(NoteResult::from)
                .collect(),
        }
    }

    pub fn clock_mut(&mut self) -> &mut TimingClock<P> {
        &mut self.clock
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn engine(&self) -> &JudgmentEngine {
        &self.engine
    }

    pub fn settings(&self) -> &GameplaySettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::ManualPosition;
    use crate::models::engine::{ChartTiming, HitState, KeySymbol, RawNote};
    use crate::models::stats::{Grade, OverallGrade};

    const A: KeySymbol = KeySymbol(1);
    const B: KeySymbol = KeySymbol(2);

    fn session(notes: Vec<RawNote>) -> Session<ManualPosition> {
        let timing = ChartTiming::new(120.0, 9.0, 5.0).unwrap();
        let chart = Chart::new(timing, notes).unwrap();
        let mut session =
            Session::new(&chart, GameplaySettings::new(), ManualPosition::default()).unwrap();
        session.start();
        session
    }

    fn advance_to(session: &mut Session<ManualPosition>, t: f64) {
        session.clock_mut().source_mut().set(t);
        session.tick_with(1.0 / 60.0);
    }

    #[test]
    fn test_full_play_through() {
        let mut s = session(vec![
            RawNote::tap(2.0, A),
            RawNote::tap(3.0, B),
            RawNote::hold(4.0, 5.0, A),
        ]);

        advance_to(&mut s, 1.9);
        s.queue_input(KeyEvent::down(A, 2.0));
        advance_to(&mut s, 2.0);
        s.queue_input(KeyEvent::up(A, 2.1));
        advance_to(&mut s, 2.1);

        s.queue_input(KeyEvent::down(B, 3.02));
        advance_to(&mut s, 3.02);

        s.queue_input(KeyEvent::down(A, 4.0));
        advance_to(&mut s, 4.0);
        assert_eq!(s.dispatcher().object(2).state(), HitState::Active);
        s.queue_input(KeyEvent::up(A, 5.0));
        advance_to(&mut s, 5.0);

        assert!(s.is_finished());
        let result = s.result();
        assert_eq!(result.score, 1200);
        assert_eq!(result.max_combo, 4);
        assert_eq!(result.grade, OverallGrade::SS);
        assert!(result.completed);
        assert_eq!(result.notes[2].grades, vec![Grade::Perfect, Grade::Perfect]);
        assert_eq!(result.duration, "00:00:05.000");
    }

    #[test]
    fn test_input_is_routed_after_expiry() {
        let mut s = session(vec![RawNote::tap(2.0, A)]);
        advance_to(&mut s, 1.0);

        // Press is stamped inside the window but delivered after expiry.
        s.queue_input(KeyEvent::down(A, 2.1));
        s.clock_mut().source_mut().set(2.3);
        let events = s.tick_with(0.01).to_vec();

        assert!(matches!(events[0], DispatchEvent::Expired { index: 0, .. }));
        assert!(matches!(events[1], DispatchEvent::GhostTap { .. }));
        assert_eq!(s.engine().hit_stats().miss, 1);
        assert_eq!(s.engine().hit_stats().ghost_tap, 1);
    }

    #[test]
    fn test_snapshot_reflects_live_objects() {
        let mut s = session(vec![RawNote::tap(2.0, A), RawNote::tap(8.0, B)]);
        advance_to(&mut s, 1.5);

        let snap = s.snapshot();
        assert_eq!(snap.time_label, "00:00:01.500");
        assert_eq!(snap.live_notes.len(), 1);
        assert_eq!(snap.live_notes[0].symbol, A);
        assert!(snap.live_notes[0].approach > 0.0 && snap.live_notes[0].approach < 1.0);
        assert_eq!(snap.remaining_notes, 2);
        assert_eq!(snap.accuracy, 1.0);
        assert_eq!(snap.last_grade, None);
        assert!(snap.fps > 0.0);

        s.queue_input(KeyEvent::down(A, 2.12));
        advance_to(&mut s, 2.12);
        let snap = s.snapshot();
        assert_eq!(snap.last_grade, Some(Grade::Good));
        assert!(snap.live_notes.is_empty());
        assert_eq!(snap.remaining_notes, 1);
        assert_eq!(snap.events.len(), 1);
        assert!(snap.recent_accuracy.len() <= s.settings().recent_accuracy_len);
    }

    #[test]
    fn test_result_serializes_to_json() {
        let mut s = session(vec![RawNote::tap(0.5, A)]);
        advance_to(&mut s, 1.0);

        let result = s.result();
        assert!(!result.has_no_misses);
        let json = serde_json::to_string(&result).unwrap();
        let back: SessionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
