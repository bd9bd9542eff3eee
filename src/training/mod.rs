//! Training objective for line detection.
//!
//! This module provides:
//! - The box-detection loss (balanced cross-entropy plus offset error)
//! - The multi-head objective including the convolution weight penalty

mod loss;
mod objective;

pub use loss::{BoxLoss, DEFAULT_EPSILON, LossComponents};
pub use objective::objective;
