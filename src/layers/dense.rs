//! Dense (fully connected) layer implementation.

use crate::layers::Activation;
use burn::{
    module::{Module, Param},
    nn::{Initializer, Linear, LinearConfig},
    tensor::{Tensor, backend::Backend},
};

/// Glorot (Xavier) uniform initialization with unit gain.
pub(crate) const GLOROT_UNIFORM: Initializer = Initializer::XavierUniform { gain: 1.0 };

/// Configuration for a Dense layer.
#[derive(Debug, Clone)]
pub struct DenseConfig {
    /// Number of input features.
    pub input_size: usize,
    /// Number of output features.
    pub output_size: usize,
    /// Activation function to apply after the linear transformation.
    pub activation: Activation,
}

impl DenseConfig {
    /// Creates a new DenseConfig.
    pub fn new(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            activation: Activation::Linear,
        }
    }

    /// Sets the activation function.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Initializes the Dense layer with Glorot-uniform weights and zero bias.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Dense<B> {
        let mut linear = LinearConfig::new(self.input_size, self.output_size)
            .with_initializer(GLOROT_UNIFORM)
            .init(device);
        linear.bias = Some(Param::from_tensor(Tensor::zeros(
            [self.output_size],
            device,
        )));

        Dense {
            linear,
            input_size: self.input_size,
            output_size: self.output_size,
            activation_id: self.activation.to_id(),
        }
    }
}

/// A dense (fully connected) layer with optional activation.
///
/// It performs: output = activation(input @ weights + bias)
#[derive(Module, Debug)]
pub struct Dense<B: Backend> {
    linear: Linear<B>,
    input_size: usize,
    output_size: usize,
    /// Activation function ID (0=Linear, 1=Relu, 2=Sigmoid).
    activation_id: u8,
}

impl<B: Backend> Dense<B> {
    /// Performs the forward pass.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = self.linear.forward(input);
        self.activation().apply(output)
    }

    /// Returns the input size of this layer.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns the output size of this layer.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Returns the activation function.
    pub fn activation(&self) -> Activation {
        Activation::from_id(self.activation_id)
    }

    /// Returns the kernel tensor, shape `[input_size, output_size]`.
    pub fn kernel(&self) -> Tensor<B, 2> {
        self.linear.weight.val()
    }
}
