//! Recognition engines: debounced gesture detection over buffered
//! trajectories and frame-by-frame pose detection over skeletons.

mod gesture;
mod pose;

pub use gesture::{GestureConfig, GestureEngine, GestureOutcome, HandState, decide};
pub use pose::{PoseConfig, PoseEngine, PoseOutcome};

use crate::classifier::{Classifier, Scores, check_input};
use crate::error::ClassifierError;
use crate::skeleton::Hand;

/// A confident classification, resolved to a stored label.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub hand: Hand,
    pub label: String,
    pub index: usize,
    /// Full-precision softmax probability that cleared the threshold.
    pub confidence: f32,
}

/// Runs one feature vector through the classifier and post-processes it.
fn classify(classifier: &mut dyn Classifier, features: &[f32]) -> Result<Scores, ClassifierError> {
    check_input(classifier.input_len(), features)?;
    let raw = classifier.infer(features)?;
    if raw.is_empty() {
        return Err(ClassifierError::Backend("empty output".to_string()));
    }
    Ok(Scores::from_raw(raw))
}
