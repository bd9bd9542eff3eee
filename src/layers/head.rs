//! Per-line detection head.

use crate::layers::rescale::rescale_offset;
use crate::layers::{Activation, Dense, DenseConfig};
use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};

/// Predicts box confidences and in-box offsets for one spectral line.
///
/// Output layout is `[confidence_0 .. confidence_{boxes-1}, offset_0 .. offset_{boxes-1}]`.
#[derive(Module, Debug)]
pub struct LineHead<B: Backend> {
    box_layer: Dense<B>,
    offset_layer: Dense<B>,
    boxes: usize,
}

impl<B: Backend> LineHead<B> {
    /// Creates a head reading `input_size` shared features.
    pub fn new(input_size: usize, boxes: usize, device: &B::Device) -> Self {
        let layer = DenseConfig::new(input_size, boxes).with_activation(Activation::Sigmoid);
        Self {
            box_layer: layer.init(device),
            offset_layer: layer.init(device),
            boxes,
        }
    }

    /// Returns the `[batch, 2 * boxes]` head output.
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let confidence = self.box_layer.forward(features.clone());
        let offset = rescale_offset(self.offset_layer.forward(features));
        Tensor::cat(vec![confidence, offset], 1)
    }

    /// Number of boxes along the spectrum.
    pub fn boxes(&self) -> usize {
        self.boxes
    }

    /// Width of the head output.
    pub fn output_size(&self) -> usize {
        2 * self.boxes
    }

    pub(crate) fn box_layer(&self) -> &Dense<B> {
        &self.box_layer
    }

    pub(crate) fn offset_layer(&self) -> &Dense<B> {
        &self.offset_layer
    }
}
