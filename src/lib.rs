//! Hand gesture and static pose recognition over tracked hand joints.
//!
//! Joint positions are sampled into per-hand [`buffer::TemporalBuffer`]s,
//! cut into resampled windows, normalized into feature vectors and scored by
//! an external [`classifier::Classifier`]. The engines threshold and debounce
//! the scores and resolve class indices to names through the
//! [`store::SampleStore`], which also holds the recorded training samples.

pub mod buffer;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod recording;
pub mod sensor;
pub mod skeleton;
pub mod store;
pub mod window;

pub use engine::{Detection, GestureOutcome, PoseOutcome};
pub use pipeline::{Recognizer, RecognizerConfig, TickReport};
pub use skeleton::{Hand, Joint};
pub use store::{SampleKind, SampleStore, SharedStore};
