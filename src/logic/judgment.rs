//! Scoring: converts press timing into grades, score, combo and accuracy.
//!
//! The engine is a pure accumulator. It never looks at the clock; the
//! dispatcher hands it objects once they have passed.

use crate::models::engine::{HitObject, HitState, HitWindow};
use crate::models::settings::{ComboBonus, GameplaySettings, OverallThresholds, ScoreTable};
use crate::models::stats::{Grade, HitStats, OverallGrade};
use std::collections::VecDeque;

/// Outcome of a single registered judgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub grade: Grade,
    /// Signed, clamped to `[-1, 1]`; `-1.0` for misses.
    pub normalized: f64,
    /// Raw press deviation in seconds, `None` for misses without a press.
    pub deviation: Option<f64>,
    pub score_delta: u64,
}

pub struct JudgmentEngine {
    hit_window: HitWindow,
    score_table: ScoreTable,
    combo_bonus: Option<ComboBonus>,
    overall_thresholds: OverallThresholds,

    score: u64,
    combo_history: Vec<u32>,
    max_combo: u32,
    is_perfect_run: bool,
    has_no_misses: bool,
    recent_accuracy: VecDeque<f64>,
    recent_capacity: usize,
    all_abs_accuracy: Vec<f64>,
    hit_stats: HitStats,
    last_judgment: Option<Judgment>,
}

impl JudgmentEngine {
    pub fn new(settings: &GameplaySettings) -> Self {
        let recent_capacity = settings.recent_accuracy_len.max(1);
        Self {
            hit_window: settings.hit_window,
            score_table: settings.score,
            combo_bonus: settings.combo_bonus,
            overall_thresholds: settings.overall,
            score: 0,
            combo_history: vec![0],
            max_combo: 0,
            is_perfect_run: true,
            has_no_misses: true,
            recent_accuracy: VecDeque::with_capacity(recent_capacity),
            recent_capacity,
            all_abs_accuracy: Vec::new(),
            hit_stats: HitStats::new(),
            last_judgment: None,
        }
    }

    /// Judges entry `index` of a passed object. `press_time: None` is a miss.
    ///
    /// # Panics
    /// If the object has not passed; only the dispatcher calls this, and only
    /// after resolving the object.
    pub fn register_hit(
        &mut self,
        object: &mut HitObject,
        index: usize,
        press_time: Option<f64>,
    ) -> Judgment {
        assert_eq!(
            object.state(),
            HitState::Passed,
            "register_hit on an object that has not passed"
        );

        let judgment = match press_time {
            None => Judgment {
                grade: Grade::Miss,
                normalized: -1.0,
                deviation: None,
                score_delta: 0,
            },
            Some(time) => {
                let deviation = time - object.judgment_times()[index];
                let (grade, normalized) = self.hit_window.judge(deviation);
                Judgment {
                    grade,
                    normalized,
                    deviation: Some(deviation),
                    score_delta: self.points_for(grade),
                }
            }
        };

        self.apply(judgment);
        object.add_grade(judgment.grade);
        judgment
    }

    /// Registers every judgment of a passed object; unpressed entries are misses.
    pub fn judge_object(&mut self, object: &mut HitObject) -> Vec<Judgment> {
        (0..object.required_count())
            .map(|index| {
                let press = object.press_times().get(index).copied();
                self.register_hit(object, index, press)
            })
            .collect()
    }

    /// Counts a press that reached no live object.
    pub fn register_ghost_tap(&mut self) {
        self.hit_stats.ghost_tap += 1;
    }

    fn points_for(&self, grade: Grade) -> u64 {
        if grade.is_miss() {
            return 0;
        }
        let bonus = self
            .combo_bonus
            .map(|b| b.for_combo(self.combo()))
            .unwrap_or(0);
        self.score_table.points(grade) + bonus
    }

    fn apply(&mut self, judgment: Judgment) {
        let grade = judgment.grade;

        if grade.is_miss() {
            self.combo_history.push(0);
            self.has_no_misses = false;
        } else if let Some(current) = self.combo_history.last_mut() {
            *current += 1;
            self.max_combo = self.max_combo.max(*current);
        }
        if grade != Grade::Perfect {
            self.is_perfect_run = false;
        }

        self.score += judgment.score_delta;

        if self.recent_accuracy.len() == self.recent_capacity {
            self.recent_accuracy.pop_front();
        }
        self.recent_accuracy.push_back(judgment.normalized);
        self.all_abs_accuracy.push(1.0 - judgment.normalized.abs());

        self.hit_stats.record(grade);
        self.last_judgment = Some(judgment);
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    /// Current combo (last entry of the history).
    pub fn combo(&self) -> u32 {
        self.combo_history.last().copied().unwrap_or(0)
    }

    /// Combo lengths between misses, oldest first.
    pub fn combo_history(&self) -> &[u32] {
        &self.combo_history
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn is_perfect_run(&self) -> bool {
        self.is_perfect_run
    }

    pub fn has_no_misses(&self) -> bool {
        self.has_no_misses
    }

    /// Mean of `1 - |normalized|` over all judgments, `1.0` before the first.
    pub fn overall_accuracy(&self) -> f64 {
        if self.all_abs_accuracy.is_empty() {
            return 1.0;
        }
        self.all_abs_accuracy.iter().sum::<f64>() / self.all_abs_accuracy.len() as f64
    }

    pub fn overall_grade(&self) -> OverallGrade {
        if self.is_perfect_run {
            OverallGrade::SS
        } else if self.has_no_misses {
            OverallGrade::S
        } else {
            self.grade_for_accuracy(self.overall_accuracy())
        }
    }

    /// Letter band for an accuracy, ignoring the SS/S run flags.
    pub fn grade_for_accuracy(&self, accuracy: f64) -> OverallGrade {
        let t = &self.overall_thresholds;
        if accuracy >= t.a {
            OverallGrade::A
        } else if accuracy >= t.b {
            OverallGrade::B
        } else if accuracy >= t.c {
            OverallGrade::C
        } else if accuracy >= t.d {
            OverallGrade::D
        } else {
            OverallGrade::F
        }
    }

    /// Signed normalized accuracies of the most recent judgments, oldest first.
    pub fn recent_accuracies(&self) -> impl Iterator<Item = f64> + '_ {
        self.recent_accuracy.iter().copied()
    }

    pub fn hit_stats(&self) -> &HitStats {
        &self.hit_stats
    }

    pub fn last_judgment(&self) -> Option<Judgment> {
        self.last_judgment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine::{ApproachCurve, KeySymbol, RawNote};

    fn passed_tap(judgment_time: f64, press: Option<f64>) -> HitObject {
        let mut object = HitObject::new(
            &RawNote::tap(judgment_time, KeySymbol(1)),
            120.0,
            9.0,
            &ApproachCurve::default(),
        )
        .unwrap();
        object.activate();
        match press {
            Some(t) => {
                object.press(t).unwrap();
            }
            None => object.force_pass(),
        }
        object
    }

    fn engine() -> JudgmentEngine {
        JudgmentEngine::new(&GameplaySettings::new())
    }

    #[test]
    fn test_exact_press_is_perfect_ss() {
        let mut engine = engine();
        let mut tap = passed_tap(10.0, Some(10.0));
        let j = engine.register_hit(&mut tap, 0, Some(10.0));

        assert_eq!(j.grade, Grade::Perfect);
        assert_eq!(j.score_delta, 300);
        assert_eq!(engine.score(), 300);
        assert_eq!(engine.combo(), 1);
        assert_eq!(engine.overall_grade(), OverallGrade::SS);
        assert_eq!(tap.grades(), &[Grade::Perfect]);
    }

    #[test]
    fn test_late_press_is_bad() {
        let mut engine = engine();
        let mut tap = passed_tap(10.0, Some(10.3));
        let j = engine.register_hit(&mut tap, 0, Some(10.3));

        assert!((j.normalized - 0.6).abs() < 1e-9);
        assert_eq!(j.grade, Grade::Bad);
        assert_eq!(engine.score(), 50);
        assert_eq!(engine.combo(), 1);
    }

    #[test]
    fn test_miss_breaks_combo_for_good() {
        let mut engine = engine();
        for t in [1.0, 2.0, 3.0] {
            let mut tap = passed_tap(t, Some(t));
            engine.judge_object(&mut tap);
        }
        assert_eq!(engine.combo(), 3);

        let mut missed = passed_tap(4.0, None);
        let judgments = engine.judge_object(&mut missed);
        assert_eq!(judgments[0].grade, Grade::Miss);
        assert_eq!(judgments[0].score_delta, 0);
        assert_eq!(judgments[0].normalized, -1.0);
        assert_eq!(engine.recent_accuracies().last(), Some(-1.0));
        assert_eq!(engine.combo(), 0);
        assert!(!engine.has_no_misses());
        assert_eq!(engine.combo_history(), &[3, 0]);

        let mut tap = passed_tap(5.0, Some(5.0));
        engine.judge_object(&mut tap);
        assert_eq!(engine.combo(), 1);
        assert!(!engine.has_no_misses());
        assert_eq!(engine.max_combo(), 3);
        assert_eq!(engine.score(), 4 * 300);
    }

    #[test]
    fn test_perfect_and_bad_accuracy() {
        let mut engine = engine();
        let mut a = passed_tap(1.0, Some(1.0));
        let mut b = passed_tap(2.0, Some(2.3));
        engine.judge_object(&mut a);
        engine.judge_object(&mut b);

        assert!((engine.overall_accuracy() - 0.7).abs() < 1e-9);
        assert!(!engine.is_perfect_run());
        // No miss yet, so the run flag still wins over the accuracy band.
        assert_eq!(engine.overall_grade(), OverallGrade::S);
        assert_eq!(engine.grade_for_accuracy(0.7), OverallGrade::B);
    }

    #[test]
    fn test_accuracy_bands_after_a_miss() {
        let mut engine = engine();
        assert_eq!(engine.overall_accuracy(), 1.0);

        for t in [1.0, 2.0, 3.0, 4.0] {
            let mut tap = passed_tap(t, Some(t));
            engine.judge_object(&mut tap);
        }
        let mut missed = passed_tap(5.0, None);
        engine.judge_object(&mut missed);

        // [1, 1, 1, 1, 0] -> 0.8
        assert!((engine.overall_accuracy() - 0.8).abs() < 1e-9);
        assert_eq!(engine.overall_grade(), OverallGrade::A);

        assert_eq!(engine.grade_for_accuracy(0.65), OverallGrade::C);
        assert_eq!(engine.grade_for_accuracy(0.5), OverallGrade::D);
        assert_eq!(engine.grade_for_accuracy(0.2), OverallGrade::F);
    }

    #[test]
    fn test_almost_ends_perfect_run_but_scores_full() {
        let mut engine = engine();
        let mut tap = passed_tap(1.0, Some(1.07));
        let j = engine.judge_object(&mut tap)[0];
        assert_eq!(j.grade, Grade::Almost);
        assert_eq!(engine.score(), 300);
        assert_eq!(engine.overall_grade(), OverallGrade::S);
    }

    #[test]
    fn test_recent_window_is_bounded() {
        let mut settings = GameplaySettings::new();
        settings.recent_accuracy_len = 3;
        let mut engine = JudgmentEngine::new(&settings);

        for (i, offset) in [0.0, 0.1, 0.2, -0.1, -0.2].iter().enumerate() {
            let t = i as f64 + 1.0;
            let mut tap = passed_tap(t, Some(t + offset));
            engine.judge_object(&mut tap);
        }
        let recent: Vec<f64> = engine.recent_accuracies().collect();
        assert_eq!(recent.len(), 3);
        assert!((recent[0] - 0.4).abs() < 1e-9);
        assert!((recent[2] + 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_combo_bonus_is_opt_in() {
        let mut settings = GameplaySettings::new();
        settings.combo_bonus = Some(ComboBonus::default());
        let mut engine = JudgmentEngine::new(&settings);

        for i in 0..11 {
            let t = i as f64 + 1.0;
            let mut tap = passed_tap(t, Some(t));
            engine.judge_object(&mut tap);
        }
        // Hit 11 is scored with a combo of 10 behind it.
        assert_eq!(engine.score(), 11 * 300 + 80);
        assert_eq!(engine.last_judgment().map(|j| j.score_delta), Some(380));
    }

    #[test]
    fn test_hold_judges_both_ends() {
        let mut engine = engine();
        let mut hold = HitObject::new(
            &RawNote::hold(1.0, 3.0, KeySymbol(4)),
            120.0,
            9.0,
            &ApproachCurve::default(),
        )
        .unwrap();
        hold.activate();
        hold.press(1.0).unwrap();
        hold.force_pass();

        let judgments = engine.judge_object(&mut hold);
        assert_eq!(judgments.len(), 2);
        assert_eq!(judgments[0].grade, Grade::Perfect);
        assert_eq!(judgments[1].grade, Grade::Miss);
        assert_eq!(hold.grades(), &[Grade::Perfect, Grade::Miss]);
        assert_eq!(engine.hit_stats().judged(), 2);
    }

    #[test]
    #[should_panic(expected = "has not passed")]
    fn test_register_requires_passed_object() {
        let mut engine = engine();
        let mut object = HitObject::new(
            &RawNote::tap(1.0, KeySymbol(1)),
            120.0,
            9.0,
            &ApproachCurve::default(),
        )
        .unwrap();
        object.activate();
        engine.register_hit(&mut object, 0, Some(1.0));
    }
}
