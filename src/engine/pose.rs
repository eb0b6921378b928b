use log::{debug, warn};

use super::{Detection, classify};
use crate::classifier::Classifier;
use crate::normalize::pose_features;
use crate::skeleton::{Hand, HandSkeleton};
use crate::store::{SampleKind, SampleStore};

#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfig {
    pub confidence_threshold: f32,
    pub enable_left: bool,
    pub enable_right: bool,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.9,
            enable_left: true,
            enable_right: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoseOutcome {
    InsufficientClasses,
    Disabled,
    Untracked,
    /// The skeleton lacked a joint the features need.
    Unavailable,
    ClassifierFailed,
    NoDetection,
    Detected(Detection),
}

/// Classifies static hand poses every tick. Poses are not debounced: the
/// current pose follows the hand as long as the classifier stays confident.
#[derive(Debug)]
pub struct PoseEngine {
    config: PoseConfig,
    current: [Option<String>; 2],
}

impl PoseEngine {
    pub fn new(config: PoseConfig) -> Self {
        Self {
            config,
            current: Default::default(),
        }
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    pub fn current_pose(&self, hand: Hand) -> Option<&str> {
        self.current[hand.index()].as_deref()
    }

    pub fn reset_pose(&mut self, hand: Hand) {
        self.current[hand.index()] = None;
    }

    /// `skeleton` is `None` while the hand is not tracked.
    pub fn tick(
        &mut self,
        hand: Hand,
        skeleton: Option<&HandSkeleton>,
        classifier: &mut dyn Classifier,
        store: &SampleStore,
    ) -> PoseOutcome {
        let enabled = match hand {
            Hand::Left => self.config.enable_left,
            Hand::Right => self.config.enable_right,
        };
        if !enabled {
            return PoseOutcome::Disabled;
        }
        if !store.has_enough_classes(SampleKind::Pose) {
            return PoseOutcome::InsufficientClasses;
        }
        let Some(skeleton) = skeleton else {
            return PoseOutcome::Untracked;
        };
        let features = match pose_features(skeleton) {
            Ok(f) => f,
            Err(e) => {
                debug!("{} hand pose unavailable: {e}", hand.as_str());
                return PoseOutcome::Unavailable;
            }
        };
        let scores = match classify(classifier, &features) {
            Ok(s) => s,
            Err(e) => {
                warn!("pose classifier rejected {} hand input: {e}", hand.as_str());
                return PoseOutcome::ClassifierFailed;
            }
        };

        let Some((index, confidence)) = scores.best() else {
            return PoseOutcome::NoDetection;
        };
        if confidence <= self.config.confidence_threshold {
            return PoseOutcome::NoDetection;
        }
        let Some(label) = store.index_to_name(SampleKind::Pose, index) else {
            warn!("pose index {index} has no stored label");
            return PoseOutcome::NoDetection;
        };
        self.current[hand.index()] = Some(label.to_string());
        PoseOutcome::Detected(Detection {
            hand,
            label: label.to_string(),
            index,
            confidence,
        })
    }
}
