use log::{debug, info, warn};
use nalgebra::UnitQuaternion;

use super::{Detection, classify};
use crate::buffer::{BufferConfig, TemporalBuffer};
use crate::classifier::{Classifier, Scores};
use crate::normalize::normalize;
use crate::skeleton::Hand;
use crate::store::{SampleKind, SampleStore};
use crate::window::{Strategy, WindowAggregator};

/// Output slot the gesture model reserves for "no gesture".
pub const NO_GESTURE_INDEX: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    pub bounding_cube_size: f32,
    pub confidence_threshold: f32,
    pub interval_secs: f32,
    pub min_interval_secs: f32,
    pub strategy: Strategy,
    pub debounce_secs: f64,
    pub enable_left: bool,
    pub enable_right: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            bounding_cube_size: 1.0,
            confidence_threshold: 0.9,
            interval_secs: 0.5,
            min_interval_secs: 1.0,
            strategy: Strategy::Single,
            debounce_secs: 1.0,
            enable_left: true,
            enable_right: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandState {
    Enabled,
    /// Debouncing after a detection until the deadline passes.
    Suspended { until: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Fewer than two gestures are stored.
    InsufficientClasses,
    Disabled,
    Suspended { remaining_secs: f64 },
    /// Buffer still filling or recovering from tracking loss, or motion inside the deadzone.
    NotReady,
    ClassifierFailed,
    NoDetection,
    Detected(Detection),
}

#[derive(Debug, Clone)]
struct HandChannel {
    state: HandState,
    current: Option<String>,
    display: Vec<Vec<f32>>,
}

impl Default for HandChannel {
    fn default() -> Self {
        Self {
            state: HandState::Enabled,
            current: None,
            display: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct GestureEngine {
    config: GestureConfig,
    aggregator: WindowAggregator,
    hands: [HandChannel; 2],
}

impl GestureEngine {
    pub fn new(config: GestureConfig, buffer: &BufferConfig) -> Self {
        Self {
            config,
            aggregator: WindowAggregator::new(buffer),
            hands: Default::default(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn state(&self, hand: Hand) -> HandState {
        self.hands[hand.index()].state
    }

    /// Last detected gesture for `hand`, until reset.
    pub fn current_gesture(&self, hand: Hand) -> Option<&str> {
        self.hands[hand.index()].current.as_deref()
    }

    pub fn reset_gesture(&mut self, hand: Hand) {
        self.hands[hand.index()].current = None;
    }

    /// Rounded probabilities of the last attempt, one row per window.
    pub fn display_scores(&self, hand: Hand) -> &[Vec<f32>] {
        &self.hands[hand.index()].display
    }

    fn enabled(&self, hand: Hand) -> bool {
        match hand {
            Hand::Left => self.config.enable_left,
            Hand::Right => self.config.enable_right,
        }
    }

    /// One recognition attempt for `hand` at time `now` (seconds).
    pub fn tick(
        &mut self,
        now: f64,
        hand: Hand,
        buffer: &TemporalBuffer,
        reference: &UnitQuaternion<f32>,
        classifier: &mut dyn Classifier,
        store: &SampleStore,
    ) -> GestureOutcome {
        if !store.has_enough_classes(SampleKind::Gesture) {
            return GestureOutcome::InsufficientClasses;
        }
        if !self.enabled(hand) {
            return GestureOutcome::Disabled;
        }

        let channel = &mut self.hands[hand.index()];
        if let HandState::Suspended { until } = channel.state {
            if now < until {
                return GestureOutcome::Suspended {
                    remaining_secs: until - now,
                };
            }
            debug!("{} hand gesture detection re-enabled", hand.as_str());
            channel.state = HandState::Enabled;
        }

        // the model takes a fixed-length input, so wait for a full buffer
        if buffer.len() < buffer.capacity() {
            return GestureOutcome::NotReady;
        }
        let Some(windows) = self.aggregator.windows(
            buffer,
            now,
            self.config.interval_secs,
            self.config.min_interval_secs,
            self.config.strategy,
        ) else {
            return GestureOutcome::NotReady;
        };

        let mut scores = Vec::with_capacity(windows.len());
        for window in &windows {
            let features = match normalize(&window.points, reference, self.config.bounding_cube_size) {
                Ok(f) => f,
                Err(e) => {
                    debug!("skipping {} hand window: {e}", hand.as_str());
                    return GestureOutcome::NotReady;
                }
            };
            match classify(classifier, &features) {
                Ok(s) => scores.push(s),
                Err(e) => {
                    warn!("gesture classifier rejected {} hand input: {e}", hand.as_str());
                    return GestureOutcome::ClassifierFailed;
                }
            }
        }

        let channel = &mut self.hands[hand.index()];
        channel.display = scores.iter().map(|s| s.rounded.clone()).collect();

        let Some((index, confidence)) =
            decide(self.config.strategy, self.config.confidence_threshold, &scores)
        else {
            return GestureOutcome::NoDetection;
        };
        let Some(label) = store.index_to_name(SampleKind::Gesture, index) else {
            warn!("gesture index {index} has no stored label");
            return GestureOutcome::NoDetection;
        };

        info!("{} hand gesture '{label}' ({confidence:.2})", hand.as_str());
        channel.current = Some(label.to_string());
        channel.state = HandState::Suspended {
            until: now + self.config.debounce_secs,
        };
        GestureOutcome::Detected(Detection {
            hand,
            label: label.to_string(),
            index,
            confidence,
        })
    }
}

/// Picks the label index and probability a strategy settles on, if any
/// probability clears `threshold`.
///
/// `BestOf` keeps a running maximum over the windows in order and stops at
/// the first window after which that maximum clears `threshold`. It reports
/// the ordinal of the window holding the maximum, not the class position
/// inside it.
pub fn decide(strategy: Strategy, threshold: f32, scores: &[Scores]) -> Option<(usize, f32)> {
    match strategy {
        Strategy::Single => {
            let (index, p) = scores.first()?.best()?;
            (index != NO_GESTURE_INDEX && p > threshold).then_some((index, p))
        }
        Strategy::BestOf => {
            let mut best: Option<(usize, f32)> = None;
            for (w, s) in scores.iter().enumerate() {
                for &p in &s.probabilities {
                    if best.is_none_or(|(_, b)| p > b) {
                        best = Some((w, p));
                    }
                }
                if best.is_some_and(|(_, b)| b > threshold) {
                    return best;
                }
            }
            None
        }
        Strategy::GrowFromLatest | Strategy::ShrinkFromFull => scores.iter().find_map(|s| {
            s.probabilities
                .iter()
                .enumerate()
                .find(|&(_, &p)| p > threshold)
                .map(|(i, &p)| (i, p))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::HandFrame;
    use crate::classifier::FnClassifier;
    use nalgebra::Vector3;

    fn store_with(names: &[&str]) -> SampleStore {
        let mut s = SampleStore::in_memory();
        for n in names {
            s.add(SampleKind::Gesture, n, vec![]).unwrap();
        }
        s
    }

    /// Buffer holding a 30-sample line of length 0.5, sampled up to t = 2.9.
    fn moving_buffer() -> TemporalBuffer {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        for i in 0..30 {
            let p = Vector3::new(0.5 * i as f32 / 29.0, 0.0, 0.0);
            buf.push(i as f64 * 0.1, HandFrame::Tracked(&[p]));
        }
        buf
    }

    fn fixed(scores: Vec<f32>) -> FnClassifier<impl FnMut(&[f32]) -> Vec<f32>> {
        FnClassifier::new(90, move |_: &[f32]| scores.clone())
    }

    fn engine(strategy: Strategy) -> GestureEngine {
        let cfg = GestureConfig {
            strategy,
            ..GestureConfig::default()
        };
        GestureEngine::new(cfg, &BufferConfig::default())
    }

    #[test]
    fn single_window_detects_and_debounces() {
        let store = store_with(&["none", "swipe", "circle"]);
        let buf = moving_buffer();
        let mut clf = fixed(vec![0.0, 5.0, 1.0]);
        let mut eng = engine(Strategy::Single);
        let q = UnitQuaternion::identity();

        let out = eng.tick(3.0, Hand::Right, &buf, &q, &mut clf, &store);
        let GestureOutcome::Detected(d) = out else {
            panic!("expected detection, got {out:?}");
        };
        assert_eq!(d.index, 1);
        assert_eq!(d.label, "swipe");
        assert!((d.confidence - 0.97556).abs() < 1e-4);
        assert_eq!(eng.current_gesture(Hand::Right), Some("swipe"));
        assert_eq!(eng.display_scores(Hand::Right), &[vec![0.01, 0.98, 0.02]]);
        assert_eq!(eng.state(Hand::Right), HandState::Suspended { until: 4.0 });

        // the other hand is unaffected by the debounce
        assert!(matches!(
            eng.tick(3.5, Hand::Left, &buf, &q, &mut clf, &store),
            GestureOutcome::Detected(_)
        ));
        assert!(matches!(
            eng.tick(3.5, Hand::Right, &buf, &q, &mut clf, &store),
            GestureOutcome::Suspended { .. }
        ));
        assert!(matches!(
            eng.tick(4.0, Hand::Right, &buf, &q, &mut clf, &store),
            GestureOutcome::Detected(_)
        ));

        eng.reset_gesture(Hand::Right);
        assert_eq!(eng.current_gesture(Hand::Right), None);
    }

    #[test]
    fn reserved_slot_and_low_confidence_are_ignored() {
        let store = store_with(&["none", "swipe"]);
        let buf = moving_buffer();
        let q = UnitQuaternion::identity();
        let mut eng = engine(Strategy::Single);

        let mut idle = fixed(vec![9.0, 0.0]);
        assert_eq!(
            eng.tick(3.0, Hand::Left, &buf, &q, &mut idle, &store),
            GestureOutcome::NoDetection
        );
        let mut unsure = fixed(vec![0.0, 1.0]);
        assert_eq!(
            eng.tick(3.0, Hand::Left, &buf, &q, &mut unsure, &store),
            GestureOutcome::NoDetection
        );
        assert_eq!(eng.state(Hand::Left), HandState::Enabled);
    }

    #[test]
    fn idle_with_fewer_than_two_classes() {
        let store = store_with(&["swipe"]);
        let buf = moving_buffer();
        let mut clf = fixed(vec![0.0, 9.0]);
        let mut eng = engine(Strategy::Single);
        assert_eq!(
            eng.tick(3.0, Hand::Left, &buf, &UnitQuaternion::identity(), &mut clf, &store),
            GestureOutcome::InsufficientClasses
        );
    }

    #[test]
    fn size_mismatch_skips_the_tick() {
        let store = store_with(&["none", "swipe"]);
        let buf = moving_buffer();
        let mut clf = FnClassifier::new(22, |_: &[f32]| vec![0.0, 9.0]);
        let mut eng = engine(Strategy::Single);
        assert_eq!(
            eng.tick(3.0, Hand::Left, &buf, &UnitQuaternion::identity(), &mut clf, &store),
            GestureOutcome::ClassifierFailed
        );
        assert_eq!(eng.state(Hand::Left), HandState::Enabled);
    }

    #[test]
    fn still_hand_is_not_ready() {
        let store = store_with(&["none", "swipe"]);
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        for i in 0..30 {
            buf.push(i as f64 * 0.1, HandFrame::Tracked(&[Vector3::new(0.2, 0.2, 0.2)]));
        }
        let mut clf = fixed(vec![0.0, 9.0]);
        let mut eng = engine(Strategy::GrowFromLatest);
        assert_eq!(
            eng.tick(3.0, Hand::Left, &buf, &UnitQuaternion::identity(), &mut clf, &store),
            GestureOutcome::NotReady
        );
    }

    #[test]
    fn partial_buffer_is_not_ready() {
        let store = store_with(&["none", "swipe"]);
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        for i in 0..12 {
            buf.push(i as f64 * 0.1, HandFrame::Tracked(&[Vector3::new(i as f32, 0.0, 0.0)]));
        }
        let mut clf = fixed(vec![0.0, 9.0]);
        let mut eng = engine(Strategy::Single);
        assert_eq!(
            eng.tick(1.2, Hand::Left, &buf, &UnitQuaternion::identity(), &mut clf, &store),
            GestureOutcome::NotReady
        );
    }

    #[test]
    fn disabled_hand_is_skipped() {
        let store = store_with(&["none", "swipe"]);
        let cfg = GestureConfig {
            enable_left: false,
            ..GestureConfig::default()
        };
        let mut eng = GestureEngine::new(cfg, &BufferConfig::default());
        let mut clf = fixed(vec![0.0, 9.0]);
        assert_eq!(
            eng.tick(
                3.0,
                Hand::Left,
                &moving_buffer(),
                &UnitQuaternion::identity(),
                &mut clf,
                &store
            ),
            GestureOutcome::Disabled
        );
    }

    #[test]
    fn best_of_reports_winning_window_ordinal() {
        let scores = vec![
            Scores::from_raw(vec![0.0, 2.0, 0.0]),
            Scores::from_raw(vec![0.0, 0.0, 0.0]),
            Scores::from_raw(vec![8.0, 0.0, 0.0]),
        ];
        // strongest value is class 0 of window 2; the window ordinal wins
        let (index, p) = decide(Strategy::BestOf, 0.9, &scores).unwrap();
        assert_eq!(index, 2);
        assert!(p > 0.99);
        assert_eq!(decide(Strategy::BestOf, 0.9995, &scores), None);
    }

    #[test]
    fn best_of_stops_at_first_window_clearing_threshold() {
        let scores = vec![
            Scores::from_raw(vec![0.0, 4.0, 0.0]),
            Scores::from_raw(vec![0.0, 0.0, 9.0]),
        ];
        // window 1 is stronger but window 0 already clears 0.9
        let (index, p) = decide(Strategy::BestOf, 0.9, &scores).unwrap();
        assert_eq!(index, 0);
        assert!((p - 0.9647).abs() < 1e-3, "{p}");

        let (index, p) = decide(Strategy::BestOf, 0.98, &scores).unwrap();
        assert_eq!(index, 1);
        assert!(p > 0.999);
    }

    #[test]
    fn ladders_take_first_confident_class() {
        let scores = vec![
            Scores::from_raw(vec![0.0, 1.0, 0.0]),
            Scores::from_raw(vec![0.0, 0.0, 6.0]),
            Scores::from_raw(vec![0.0, 9.0, 0.0]),
        ];
        let (index, _) = decide(Strategy::GrowFromLatest, 0.9, &scores).unwrap();
        assert_eq!(index, 2);
        let (index, _) = decide(Strategy::ShrinkFromFull, 0.9, &scores[2..]).unwrap();
        assert_eq!(index, 1);
        assert_eq!(decide(Strategy::GrowFromLatest, 0.9, &scores[..1]), None);
    }

    #[test]
    fn ladder_strategy_runs_every_window() {
        let store = store_with(&["none", "swipe", "circle"]);
        let buf = moving_buffer();
        let mut calls = 0;
        let mut clf = FnClassifier::new(90, |_: &[f32]| {
            calls += 1;
            vec![0.0, 0.0, 0.0]
        });
        let mut eng = engine(Strategy::GrowFromLatest);
        assert_eq!(
            eng.tick(3.0, Hand::Right, &buf, &UnitQuaternion::identity(), &mut clf, &store),
            GestureOutcome::NoDetection
        );
        drop(clf);
        // windows of 1, 2 and 3 seconds plus the full buffer
        assert_eq!(calls, 4);
        assert_eq!(eng.display_scores(Hand::Right).len(), 4);
    }
}
