//! Model-related error types.

use thiserror::Error;

/// Errors that can occur while building models or preparing detection data.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid layer configuration: {message}")]
    InvalidLayerConfig { message: String },

    #[error("Input of length {length} is too short for convolution stage {stage}")]
    InputTooShort { length: usize, stage: usize },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Detection output width {0} is odd; expected confidence and offset halves")]
    OddOutputWidth(usize),

    #[error("Invalid detection target: {message}")]
    InvalidTarget { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
