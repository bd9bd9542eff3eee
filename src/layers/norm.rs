//! Batch normalization over feature channels.

use burn::{
    module::Module,
    nn::{BatchNorm, BatchNormConfig},
    tensor::{Tensor, backend::Backend},
};

/// Variance floor added before the square root.
pub const BATCH_NORM_EPSILON: f64 = 1e-3;

/// Weight of the current batch in the running statistics (decay 0.99).
pub const BATCH_NORM_MOMENTUM: f64 = 0.01;

/// Returns the batch-norm configuration shared by every normalized stage.
pub(crate) fn batch_norm_config(num_features: usize) -> BatchNormConfig {
    BatchNormConfig::new(num_features)
        .with_epsilon(BATCH_NORM_EPSILON)
        .with_momentum(BATCH_NORM_MOMENTUM)
}

/// Batch normalization applied to a flat `[batch, features]` tensor.
///
/// Burn normalizes over channel-first tensors of at least rank 3, so the
/// features are viewed as channels with a spatial length of one.
#[derive(Module, Debug)]
pub struct FeatureNorm<B: Backend> {
    batch_norm: BatchNorm<B, 1>,
    num_features: usize,
}

impl<B: Backend> FeatureNorm<B> {
    /// Creates a normalization layer over `num_features` features.
    pub fn new(num_features: usize, device: &B::Device) -> Self {
        Self {
            batch_norm: batch_norm_config(num_features).init(device),
            num_features,
        }
    }

    /// Normalizes each feature using batch statistics during autodiff
    /// passes and running statistics otherwise.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, features] = input.dims();
        let input_3d = input.reshape([batch, features, 1]);
        let output_3d = self.batch_norm.forward(input_3d);
        output_3d.reshape([batch, features])
    }

    /// Returns the number of normalized features.
    pub fn num_features(&self) -> usize {
        self.num_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn test_inference_uses_initial_running_stats() {
        type TestBackend = NdArray;
        let device = <TestBackend as Backend>::Device::default();
        let norm = FeatureNorm::<TestBackend>::new(3, &device);

        let input = Tensor::<TestBackend, 2>::from_floats([[1.0, -2.0, 4.0]], &device);
        let output: Vec<f32> = norm.forward(input).to_data().to_vec().unwrap();

        // Running mean 0 and variance 1 leave values scaled by 1/sqrt(1 + eps).
        let scale = 1.0 / (1.0 + BATCH_NORM_EPSILON as f32).sqrt();
        for (out, expected) in output.iter().zip([1.0, -2.0, 4.0]) {
            assert!((out - expected * scale).abs() < 1e-5);
        }
    }

    #[test]
    fn test_training_uses_batch_stats() {
        type TestBackend = Autodiff<NdArray>;
        let device = <TestBackend as Backend>::Device::default();
        let norm = FeatureNorm::<TestBackend>::new(2, &device);

        let input = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 10.0], [3.0, 20.0], [5.0, 30.0], [7.0, 40.0]],
            &device,
        );
        let output = norm.forward(input);
        let means: Vec<f32> = output.clone().mean_dim(0).to_data().to_vec().unwrap();

        assert_eq!(output.dims(), [4, 2]);
        assert!(means.iter().all(|m| m.abs() < 1e-4));
    }
}
