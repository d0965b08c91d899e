//! Scheduling of hit objects against the clock.
//!
//! Objects live in an index-stable arena and move through three disjoint
//! stages, `Pending -> Live -> Resolved`. Scans collect indices first and
//! apply the moves afterwards, so no collection is mutated while iterated.

use crate::logic::judgment::{Judgment, JudgmentEngine};
use crate::models::engine::{
    Chart, ChartError, HitObject, HitState, KeySymbol, NotPressable, PressOutcome,
};
use crate::models::settings::GameplaySettings;
use std::collections::{HashMap, VecDeque};

/// Stage of an object inside the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Pending,
    Live,
    Resolved,
}

/// Notification emitted for every lifecycle change.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// Object became live and is bound to its key.
    Activated { index: usize, symbol: KeySymbol },
    /// Entry of a hold was pressed; its release is now awaited.
    HoldStarted { index: usize, symbol: KeySymbol },
    /// Object resolved by the player.
    Judged {
        index: usize,
        symbol: KeySymbol,
        judgments: Vec<Judgment>,
    },
    /// Object resolved by timeout, a displaced binding or a stale press.
    Expired {
        index: usize,
        symbol: KeySymbol,
        judgments: Vec<Judgment>,
    },
    /// Key press with nothing bound to it.
    GhostTap { symbol: KeySymbol, time: f64 },
}

pub struct Dispatcher {
    objects: Vec<HitObject>,
    stages: Vec<Stage>,
    /// Sorted by lead-in time.
    pending: VecDeque<usize>,
    /// Live objects in promotion order.
    live: Vec<usize>,
    /// Key-down bindings.
    press_bindings: HashMap<KeySymbol, usize>,
    /// Key-up bindings of holds whose entry has been pressed.
    release_bindings: HashMap<KeySymbol, usize>,
    resolved: Vec<usize>,
    grace_period: f64,
}

impl Dispatcher {
    /// Builds one hit object per note; fails on the first invalid note.
    pub fn new(chart: &Chart, settings: &GameplaySettings) -> Result<Self, ChartError> {
        let objects = chart
            .notes
            .iter()
            .map(|note| {
                HitObject::new(
                    note,
                    chart.timing.bpm,
                    chart.timing.approach_rate,
                    &settings.approach,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_objects(objects, settings.hit_window.grace_period))
    }

    pub fn from_objects(objects: Vec<HitObject>, grace_period: f64) -> Self {
        let mut order: Vec<usize> = (0..objects.len()).collect();
        order.sort_by(|&a, &b| objects[a].lead_in().total_cmp(&objects[b].lead_in()));

        log::info!(
            "DISPATCH: {} objects scheduled, grace {:.3}s",
            objects.len(),
            grace_period
        );

        Self {
            stages: vec![Stage::Pending; objects.len()],
            objects,
            pending: order.into(),
            live: Vec::new(),
            press_bindings: HashMap::new(),
            release_bindings: HashMap::new(),
            resolved: Vec::new(),
            grace_period,
        }
    }

    /// Runs promotion then expiry for `now`.
    ///
    /// Both steps are guarded by time only, so repeating a tick with the same
    /// `now` changes nothing.
    pub fn tick(&mut self, now: f64, engine: &mut JudgmentEngine) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        self.promote(now, engine, &mut events);
        self.expire(now, engine, &mut events);
        events
    }

    fn promote(&mut self, now: f64, engine: &mut JudgmentEngine, events: &mut Vec<DispatchEvent>) {
        let mut promoted = Vec::new();
        while let Some(&index) = self.pending.front() {
            if self.objects[index].lead_in() > now {
                break;
            }
            self.pending.pop_front();
            promoted.push(index);
        }

        for index in promoted {
            let symbol = self.objects[index].symbol();
            if let Some(displaced) = self.press_bindings.insert(symbol, index) {
                log::warn!(
                    "DISPATCH: {} still bound to object {} when {} went live, last wins",
                    symbol,
                    displaced,
                    index
                );
                self.remove_from_live(displaced);
                events.push(self.force_resolve(displaced, engine));
            }

            self.objects[index].activate();
            self.set_stage(index, Stage::Live);
            self.live.push(index);
            events.push(DispatchEvent::Activated { index, symbol });
        }
    }

    fn expire(&mut self, now: f64, engine: &mut JudgmentEngine, events: &mut Vec<DispatchEvent>) {
        let overdue: Vec<usize> = self
            .live
            .iter()
            .copied()
            .filter(|&i| {
                let object = &self.objects[i];
                object.state() != HitState::Passed
                    && now >= object.final_judgment_time() + self.grace_period
            })
            .collect();

        for index in overdue {
            log::debug!("DISPATCH: Object {} timed out at {:.3}", index, now);
            self.unbind(index);
            self.remove_from_live(index);
            events.push(self.force_resolve(index, engine));
        }
    }

    /// Routes a key-down at `time` to the object bound to `symbol`.
    ///
    /// Returns the press's own event, preceded by the expiry of any hold it
    /// displaced from its release binding.
    pub fn key_down(
        &mut self,
        symbol: KeySymbol,
        time: f64,
        engine: &mut JudgmentEngine,
    ) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        let Some(&index) = self.press_bindings.get(&symbol) else {
            engine.register_ghost_tap();
            events.push(DispatchEvent::GhostTap { symbol, time });
            return events;
        };

        match self.objects[index].press(time) {
            Ok(PressOutcome::Passed) => events.push(self.finish(index, engine)),
            Ok(PressOutcome::Recorded) => {
                self.press_bindings.remove(&symbol);
                let release = self.objects[index].release_symbol();
                if let Some(displaced) = self.release_bindings.insert(release, index) {
                    log::warn!(
                        "DISPATCH: {} release already awaited by object {}, last wins",
                        release,
                        displaced
                    );
                    self.remove_from_live(displaced);
                    events.push(self.force_resolve(displaced, engine));
                }
                events.push(DispatchEvent::HoldStarted { index, symbol });
            }
            Ok(PressOutcome::Ignored) => {
                // Bound objects are always active; treat as a stray press.
                engine.register_ghost_tap();
                events.push(DispatchEvent::GhostTap { symbol, time });
            }
            Err(NotPressable) => events.push(self.stale_press(index, engine)),
        }
        events
    }

    /// Routes a key-up at `time`; only holds waiting for their release react.
    pub fn key_up(
        &mut self,
        symbol: KeySymbol,
        time: f64,
        engine: &mut JudgmentEngine,
    ) -> Option<DispatchEvent> {
        let index = *self.release_bindings.get(&symbol)?;

        match self.objects[index].press(time) {
            Ok(PressOutcome::Passed) => Some(self.finish(index, engine)),
            Ok(_) => None,
            Err(NotPressable) => Some(self.stale_press(index, engine)),
        }
    }

    fn finish(&mut self, index: usize, engine: &mut JudgmentEngine) -> DispatchEvent {
        self.unbind(index);
        self.remove_from_live(index);
        let judgments = engine.judge_object(&mut self.objects[index]);
        self.set_stage(index, Stage::Resolved);
        self.resolved.push(index);
        DispatchEvent::Judged {
            index,
            symbol: self.objects[index].symbol(),
            judgments,
        }
    }

    fn stale_press(&mut self, index: usize, engine: &mut JudgmentEngine) -> DispatchEvent {
        log::debug!("DISPATCH: Stale press on object {}", index);
        self.unbind(index);
        self.remove_from_live(index);
        self.force_resolve(index, engine)
    }

    /// Passes, judges (if not already judged) and resolves an unbound object.
    fn force_resolve(&mut self, index: usize, engine: &mut JudgmentEngine) -> DispatchEvent {
        let object = &mut self.objects[index];
        object.force_pass();
        let judgments = if object.grades().is_empty() {
            engine.judge_object(object)
        } else {
            Vec::new()
        };
        let symbol = object.symbol();

        if self.stages[index] != Stage::Resolved {
            self.set_stage(index, Stage::Resolved);
            self.resolved.push(index);
        }
        DispatchEvent::Expired {
            index,
            symbol,
            judgments,
        }
    }

    fn unbind(&mut self, index: usize) {
        let object = &self.objects[index];
        for (map, symbol) in [
            (&mut self.press_bindings, object.symbol()),
            (&mut self.release_bindings, object.release_symbol()),
        ] {
            if map.get(&symbol) == Some(&index) {
                map.remove(&symbol);
            }
        }
    }

    fn remove_from_live(&mut self, index: usize) {
        self.live.retain(|&i| i != index);
    }

    fn set_stage(&mut self, index: usize, stage: Stage) {
        debug_assert!(
            self.stages[index] <= stage,
            "object {} moved backwards from {:?} to {:?}",
            index,
            self.stages[index],
            stage
        );
        self.stages[index] = stage;
    }

    pub fn object(&self, index: usize) -> &HitObject {
        &self.objects[index]
    }

    pub fn objects(&self) -> &[HitObject] {
        &self.objects
    }

    pub fn stage(&self, index: usize) -> Stage {
        self.stages[index]
    }

    /// Object currently bound to a key-down on `symbol`.
    pub fn bound_object(&self, symbol: KeySymbol) -> Option<usize> {
        self.press_bindings.get(&symbol).copied()
    }

    /// Live objects in promotion order.
    pub fn live_objects(&self) -> impl Iterator<Item = (usize, &HitObject)> {
        self.live.iter().map(move |&i| (i, &self.objects[i]))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    /// Resolved objects in resolution order.
    pub fn resolved(&self) -> &[usize] {
        &self.resolved
    }

    pub fn remaining(&self) -> usize {
        self.objects.len() - self.resolved.len()
    }

    /// True once every object has been resolved.
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine::{ChartTiming, RawNote};
    use crate::models::stats::Grade;
    use proptest::prelude::*;

    const A: KeySymbol = KeySymbol(1);
    const B: KeySymbol = KeySymbol(2);

    fn setup(notes: Vec<RawNote>) -> (Dispatcher, JudgmentEngine) {
        let settings = GameplaySettings::new();
        let timing = ChartTiming::new(120.0, 9.0, 5.0).unwrap();
        let chart = Chart::new(timing, notes).unwrap();
        (
            Dispatcher::new(&chart, &settings).unwrap(),
            JudgmentEngine::new(&settings),
        )
    }

    #[test]
    fn test_promotion_waits_for_lead_in() {
        let (mut d, mut e) = setup(vec![RawNote::tap(10.0, A)]);
        let lead_in = d.object(0).lead_in();

        assert!(d.tick(lead_in - 0.01, &mut e).is_empty());
        assert_eq!(d.stage(0), Stage::Pending);
        assert_eq!(d.object(0).state(), HitState::Inactive);

        let events = d.tick(lead_in, &mut e);
        assert_eq!(events, vec![DispatchEvent::Activated { index: 0, symbol: A }]);
        assert_eq!(d.stage(0), Stage::Live);
        assert_eq!(d.bound_object(A), Some(0));
    }

    #[test]
    fn test_on_time_press_is_perfect() {
        let (mut d, mut e) = setup(vec![RawNote::tap(10.0, A)]);
        d.tick(9.0, &mut e);

        let events = d.key_down(A, 10.0, &mut e);
        match events.as_slice() {
            [DispatchEvent::Judged { index, judgments, .. }] => {
                assert_eq!(*index, 0);
                assert_eq!(judgments[0].grade, Grade::Perfect);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(e.score(), 300);
        assert_eq!(e.combo(), 1);
        assert_eq!(d.stage(0), Stage::Resolved);
        assert_eq!(d.bound_object(A), None);
        assert!(d.is_finished());
    }

    #[test]
    fn test_late_press_is_bad() {
        let (mut d, mut e) = setup(vec![RawNote::tap(10.0, A)]);
        d.tick(10.0, &mut e);
        d.key_down(A, 10.3, &mut e);
        assert_eq!(d.object(0).grades(), &[Grade::Bad]);
        assert_eq!(e.score(), 50);
    }

    #[test]
    fn test_unpressed_object_times_out() {
        let (mut d, mut e) = setup(vec![RawNote::tap(1.0, B), RawNote::tap(10.0, A)]);
        d.tick(1.0, &mut e);
        d.key_down(B, 1.0, &mut e);
        assert_eq!(e.combo(), 1);

        d.tick(10.1, &mut e);
        assert_eq!(d.stage(1), Stage::Live);

        let events = d.tick(10.25, &mut e);
        assert!(matches!(
            events.as_slice(),
            [DispatchEvent::Expired { index: 1, .. }]
        ));
        assert_eq!(d.object(1).state(), HitState::Passed);
        assert_eq!(d.object(1).grades(), &[Grade::Miss]);
        assert_eq!(e.combo(), 0);
        assert_eq!(e.score(), 300);
        assert!(!e.has_no_misses());
        assert_eq!(d.bound_object(A), None);
    }

    #[test]
    fn test_expiry_is_inclusive_at_grace_boundary() {
        let (mut d, mut e) = setup(vec![RawNote::tap(10.0, A)]);
        d.tick(9.0, &mut e);

        assert!(d.tick(10.19, &mut e).is_empty());
        assert_eq!(d.stage(0), Stage::Live);

        let events = d.tick(10.2, &mut e);
        match events.as_slice() {
            [DispatchEvent::Expired { index: 0, judgments, .. }] => {
                assert_eq!(judgments[0].grade, Grade::Miss);
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(d.stage(0), Stage::Resolved);
    }

    #[test]
    fn test_press_after_timeout_is_ghost_tap() {
        let (mut d, mut e) = setup(vec![RawNote::tap(10.0, A)]);
        d.tick(9.0, &mut e);
        d.tick(10.3, &mut e);

        let events = d.key_down(A, 10.3, &mut e);
        assert_eq!(events, vec![DispatchEvent::GhostTap { symbol: A, time: 10.3 }]);
        assert_eq!(e.hit_stats().ghost_tap, 1);
        assert_eq!(e.hit_stats().miss, 1);
    }

    #[test]
    fn test_hold_resolves_on_release() {
        let (mut d, mut e) = setup(vec![RawNote::hold(5.0, 7.0, A)]);
        d.tick(4.0, &mut e);

        assert_eq!(
            d.key_down(A, 5.0, &mut e),
            vec![DispatchEvent::HoldStarted { index: 0, symbol: A }]
        );
        assert_eq!(d.object(0).state(), HitState::Active);
        assert_eq!(d.bound_object(A), None);

        // Releasing is the second press.
        let event = d.key_up(A, 7.05, &mut e);
        assert!(matches!(event, Some(DispatchEvent::Judged { index: 0, .. })));
        assert_eq!(d.object(0).grades(), &[Grade::Perfect, Grade::Perfect]);
        assert_eq!(e.combo(), 2);
    }

    #[test]
    fn test_hold_displacing_awaited_release_reports_expiry() {
        let (mut d, mut e) = setup(vec![RawNote::hold(5.0, 9.0, A), RawNote::hold(7.0, 8.0, A)]);
        d.tick(5.0, &mut e);
        d.key_down(A, 5.0, &mut e);
        d.tick(7.0, &mut e);
        assert_eq!(d.stage(1), Stage::Live);

        let events = d.key_down(A, 7.0, &mut e);
        match events.as_slice() {
            [
                DispatchEvent::Expired { index: 0, judgments, .. },
                DispatchEvent::HoldStarted { index: 1, symbol: A },
            ] => {
                let grades: Vec<Grade> = judgments.iter().map(|j| j.grade).collect();
                assert_eq!(grades, vec![Grade::Perfect, Grade::Miss]);
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(d.stage(0), Stage::Resolved);
        assert_eq!(d.object(0).grades(), &[Grade::Perfect, Grade::Miss]);
    }

    #[test]
    fn test_key_up_without_entry_is_ignored() {
        let (mut d, mut e) = setup(vec![RawNote::hold(5.0, 7.0, A), RawNote::tap(6.0, B)]);
        d.tick(5.0, &mut e);
        assert_eq!(d.key_up(A, 5.0, &mut e), None);
        assert_eq!(d.key_up(B, 5.0, &mut e), None);
        assert_eq!(d.object(0).press_times().len(), 0);
    }

    #[test]
    fn test_held_hold_that_is_never_released_misses_its_end() {
        let (mut d, mut e) = setup(vec![RawNote::hold(5.0, 7.0, A)]);
        d.tick(5.0, &mut e);
        d.key_down(A, 5.0, &mut e);

        d.tick(7.1, &mut e);
        assert_eq!(d.stage(0), Stage::Live);
        d.tick(7.3, &mut e);
        assert_eq!(d.stage(0), Stage::Resolved);
        assert_eq!(d.object(0).grades(), &[Grade::Perfect, Grade::Miss]);
        assert_eq!(d.key_up(A, 7.3, &mut e), None);
    }

    #[test]
    fn test_last_binding_wins() {
        // Same key, second lead-in falls before the first judgment.
        let (mut d, mut e) = setup(vec![RawNote::tap(10.0, A), RawNote::tap(10.5, A)]);
        d.tick(8.5, &mut e);
        assert_eq!(d.bound_object(A), Some(0));

        let events = d.tick(8.9, &mut e);
        assert!(matches!(events[0], DispatchEvent::Expired { index: 0, .. }));
        assert!(matches!(events[1], DispatchEvent::Activated { index: 1, .. }));
        assert_eq!(d.bound_object(A), Some(1));
        assert_eq!(d.object(0).grades(), &[Grade::Miss]);
        assert_eq!(d.stage(0), Stage::Resolved);
    }

    #[test]
    fn test_sets_stay_disjoint() {
        let notes = vec![
            RawNote::tap(2.0, A),
            RawNote::tap(3.0, B),
            RawNote::hold(4.0, 5.0, KeySymbol(3)),
        ];
        let (mut d, mut e) = setup(notes);
        for step in 0..80 {
            let now = step as f64 * 0.1;
            d.tick(now, &mut e);
            if (now - 2.0).abs() < 1e-9 {
                d.key_down(A, now, &mut e);
            }
            assert_eq!(d.pending_len() + d.live_len() + d.resolved().len(), 3);
        }
        assert!(d.is_finished());
        assert_eq!(d.remaining(), 0);
    }

    proptest! {
        #[test]
        fn repeated_tick_is_idempotent(
            times in proptest::collection::vec(0.0f64..30.0, 1..20),
            now in 0.0f64..35.0,
        ) {
            let notes = times
                .iter()
                .enumerate()
                .map(|(i, &t)| RawNote::tap(t, KeySymbol(i as u32)))
                .collect();
            let (mut d, mut e) = setup(notes);

            d.tick(now, &mut e);
            let stages: Vec<Stage> = (0..times.len()).map(|i| d.stage(i)).collect();
            let score = e.score();
            let judged = e.hit_stats().judged();

            let events = d.tick(now, &mut e);
            prop_assert!(events.is_empty());
            let again: Vec<Stage> = (0..times.len()).map(|i| d.stage(i)).collect();
            prop_assert_eq!(stages, again);
            prop_assert_eq!(e.score(), score);
            prop_assert_eq!(e.hit_stats().judged(), judged);
        }

        #[test]
        fn stages_only_move_forward(
            times in proptest::collection::vec(0.0f64..10.0, 1..12),
            steps in proptest::collection::vec(0.0f64..0.5, 1..40),
        ) {
            let notes = times
                .iter()
                .map(|&t| RawNote::tap(t, KeySymbol((t * 3.0) as u32 % 4)))
                .collect();
            let (mut d, mut e) = setup(notes);
            let mut previous: Vec<Stage> = vec![Stage::Pending; times.len()];
            let mut now = 0.0;

            for (i, step) in steps.iter().enumerate() {
                now += step;
                d.tick(now, &mut e);
                d.key_down(KeySymbol(i as u32 % 4), now, &mut e);
                for (index, prev) in previous.iter_mut().enumerate() {
                    let stage = d.stage(index);
                    prop_assert!(stage >= *prev);
                    *prev = stage;
                }
            }
        }
    }
}
