//! Error types shared across the recognition pipeline and the sample store.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::SampleKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("trajectory is empty")]
    Empty,
    /// Every point of the trajectory sits at the same position.
    #[error("trajectory has a zero-width bounding box")]
    DegenerateBounds,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoseError {
    #[error("joint {index} is not available in a skeleton of {len} joints")]
    JointUnavailable { index: usize, len: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("input size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("classifier failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no {kind} named '{name}'")]
    UnknownLabel { kind: SampleKind, name: String },
}
