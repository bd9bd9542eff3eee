//! Neural network layer implementations.
//!
//! This module contains the building blocks of the network: activations,
//! dense layers, strided convolution stages, batch normalization, the
//! per-line detection head and offset rescaling.

pub mod activation;
pub mod conv;
pub mod dense;
pub mod head;
pub mod norm;
pub mod rescale;

pub use activation::Activation;
pub use conv::{ConvStage, ConvStageConfig};
pub use dense::{Dense, DenseConfig};
pub use head::LineHead;
pub use norm::FeatureNorm;
pub use rescale::{
    inverse_rescale_offset, inverse_rescale_offset_value, rescale_offset, rescale_offset_value,
};
