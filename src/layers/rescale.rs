//! Affine rescaling of offset predictions.
//!
//! Offset heads end in a sigmoid, so raw outputs lie in (0, 1). They are
//! stretched to (-0.1, 1.1) so a line centre can sit slightly past either
//! edge of its box.

use burn::tensor::{Tensor, backend::Backend};

/// Lower bound of the rescaled offset range.
pub const OFFSET_MIN: f32 = -0.1;

/// Width of the rescaled offset range.
pub const OFFSET_SPAN: f32 = 1.2;

/// Maps raw sigmoid outputs to offsets: `-0.1 + 1.2 * raw`.
pub fn rescale_offset<B: Backend, const D: usize>(raw: Tensor<B, D>) -> Tensor<B, D> {
    raw.mul_scalar(OFFSET_SPAN).add_scalar(OFFSET_MIN)
}

/// Inverse of [`rescale_offset`].
pub fn inverse_rescale_offset<B: Backend, const D: usize>(offset: Tensor<B, D>) -> Tensor<B, D> {
    offset.sub_scalar(OFFSET_MIN).div_scalar(OFFSET_SPAN)
}

/// Scalar form of [`rescale_offset`].
pub fn rescale_offset_value(raw: f32) -> f32 {
    OFFSET_MIN + OFFSET_SPAN * raw
}

/// Scalar form of [`inverse_rescale_offset`].
pub fn inverse_rescale_offset_value(offset: f32) -> f32 {
    (offset - OFFSET_MIN) / OFFSET_SPAN
}
