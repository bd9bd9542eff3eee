//! Strided 1-D convolution stage: convolution, batch norm, ReLU.

use crate::errors::ModelError;
use crate::layers::Activation;
use crate::layers::dense::GLOROT_UNIFORM;
use crate::layers::norm::batch_norm_config;
use burn::{
    module::{Module, Param},
    nn::{
        BatchNorm,
        conv::{Conv1d, Conv1dConfig},
    },
    tensor::{Tensor, backend::Backend},
};

/// Configuration for a convolution stage.
#[derive(Debug, Clone)]
pub struct ConvStageConfig {
    /// Number of input channels.
    pub channels_in: usize,
    /// Number of filters.
    pub filters: usize,
    /// Kernel width.
    pub kernel_size: usize,
    /// Stride along the spectrum.
    pub stride: usize,
}

impl ConvStageConfig {
    /// Creates a stage configuration.
    pub fn new(channels_in: usize, filters: usize, kernel_size: usize, stride: usize) -> Self {
        Self {
            channels_in,
            filters,
            kernel_size,
            stride,
        }
    }

    /// Length of the output for an unpadded convolution over `input_length`.
    ///
    /// Returns `None` when the kernel does not fit.
    pub fn output_length(&self, input_length: usize) -> Option<usize> {
        if self.stride == 0 || input_length < self.kernel_size {
            return None;
        }
        Some((input_length - self.kernel_size) / self.stride + 1)
    }

    /// Initializes the stage for inputs of `input_length`.
    ///
    /// `stage` is the 1-based index used in error reports.
    pub fn init<B: Backend>(
        &self,
        stage: usize,
        input_length: usize,
        device: &B::Device,
    ) -> Result<ConvStage<B>, ModelError> {
        if self.channels_in == 0 || self.filters == 0 || self.kernel_size == 0 {
            return Err(ModelError::InvalidLayerConfig {
                message: format!("convolution stage {stage} has a zero dimension"),
            });
        }
        let output_length = self
            .output_length(input_length)
            .ok_or(ModelError::InputTooShort {
                length: input_length,
                stage,
            })?;

        let mut conv = Conv1dConfig::new(self.channels_in, self.filters, self.kernel_size)
            .with_stride(self.stride)
            .init(device);
        conv.weight = GLOROT_UNIFORM.init_with(
            [self.filters, self.channels_in, self.kernel_size],
            Some(self.channels_in * self.kernel_size),
            Some(self.filters * self.kernel_size),
            device,
        );
        conv.bias = Some(Param::from_tensor(Tensor::zeros([self.filters], device)));

        Ok(ConvStage {
            conv,
            norm: batch_norm_config(self.filters).init(device),
            filters: self.filters,
            output_length,
        })
    }
}

/// One convolution stage operating on channel-first `[batch, channels, length]` tensors.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    conv: Conv1d<B>,
    norm: BatchNorm<B, 1>,
    filters: usize,
    output_length: usize,
}

impl<B: Backend> ConvStage<B> {
    /// Performs the forward pass.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.conv.forward(input);
        let x = self.norm.forward(x);
        Activation::Relu.apply(x)
    }

    /// Number of output channels.
    pub fn filters(&self) -> usize {
        self.filters
    }

    /// Spatial length of the output.
    pub fn output_length(&self) -> usize {
        self.output_length
    }

    /// Squared L2 norm of the convolution kernel.
    pub fn kernel_sq_norm(&self) -> Tensor<B, 1> {
        self.conv.weight.val().powf_scalar(2.0).sum()
    }

    /// Parameter count of the convolution alone.
    pub fn conv_params(&self) -> usize {
        self.conv.num_params()
    }

    /// Parameter count of the normalization alone.
    pub fn norm_params(&self) -> usize {
        self.norm.num_params()
    }
}
