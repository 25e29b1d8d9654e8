use thiserror::Error;

/// Inputs that make a whole parse call meaningless.
///
/// These surface wrapped in an [`anyhow::Error`]; use `downcast_ref` to
/// inspect them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("network output is empty")]
    EmptyOutput,

    #[error("network output has {actual} planes, the body model needs {required}")]
    MissingPlanes { required: usize, actual: usize },

    #[error("batch index {index} is out of range for a batch of {len}")]
    BatchIndex { index: usize, len: usize },

    #[error("frame size must be positive, got {width}x{height}")]
    InvalidFrame { width: i32, height: i32 },

    #[error("affinity field components differ in shape: {x:?} vs {y:?}")]
    FieldShape { x: (usize, usize), y: (usize, usize) },

    #[error("expected {expected} limb matches, got {actual}")]
    LimbCount { expected: usize, actual: usize },

    #[error("expected candidates for {expected} joints, got {actual}")]
    JointCount { expected: usize, actual: usize },

    #[error("keypoint id {0} does not exist in this image")]
    UnknownKeypoint(usize),

    #[error("invalid body model: {0}")]
    BodyModel(String),
}
