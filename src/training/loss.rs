//! Box-detection loss.
//!
//! Predictions and targets share the layout `[..., 2 * boxes]`: box
//! confidences followed by in-box offsets. The loss is a class-balanced
//! binary cross-entropy over the confidences plus a squared error on the
//! offsets of boxes that contain a line.

use burn::tensor::{Tensor, backend::Backend};

/// Default numerical floor, matching the usual Keras `epsilon()`.
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// The two terms of the box-detection loss.
#[derive(Debug, Clone)]
pub struct LossComponents<B: Backend> {
    /// Balanced cross-entropy over box confidences.
    pub classification: Tensor<B, 1>,
    /// Squared offset error over positive boxes.
    pub offset: Tensor<B, 1>,
}

impl<B: Backend> LossComponents<B> {
    /// Unweighted sum of both terms.
    pub fn total(self) -> Tensor<B, 1> {
        self.classification + self.offset
    }
}

/// Loss for box confidences and offsets.
///
/// Sums run over every element of the batch and the counts `N1`/`N2` are
/// batch-wide, so a batch behaves as one pooled set of boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxLoss {
    epsilon: f64,
}

impl Default for BoxLoss {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl BoxLoss {
    /// Creates the loss with the default epsilon.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clamp and count floor.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Returns the clamp and count floor.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Computes the total loss.
    ///
    /// # Panics
    ///
    /// Panics if the last dimension of `predictions` is odd.
    pub fn compute<B: Backend, const D: usize>(
        &self,
        targets: Tensor<B, D>,
        predictions: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        self.components(targets, predictions).total()
    }

    /// Computes the classification and offset terms separately.
    ///
    /// # Panics
    ///
    /// Panics if the last dimension of `predictions` is odd.
    pub fn components<B: Backend, const D: usize>(
        &self,
        targets: Tensor<B, D>,
        predictions: Tensor<B, D>,
    ) -> LossComponents<B> {
        let width = predictions.dims()[D - 1];
        assert!(
            width % 2 == 0,
            "prediction width {} must be even (confidence half + offset half)",
            width
        );
        let boxes = width / 2;
        let eps = self.epsilon;

        let label = targets.clone().narrow(D - 1, 0, boxes);
        let target_offset = targets.narrow(D - 1, boxes, boxes);
        let confidence = predictions.clone().narrow(D - 1, 0, boxes);
        let predicted_offset = predictions.narrow(D - 1, boxes, boxes);

        let negative = label.clone().neg().add_scalar(1.0);
        let n1 = label.clone().sum().add_scalar(eps);
        let n2 = negative.clone().sum().add_scalar(eps);

        let log_p = confidence.clone().clamp(eps, 1.0 - eps).log();
        let log_not_p = confidence.neg().add_scalar(1.0).clamp(eps, 1.0 - eps).log();
        let positive_term = (label.clone() * log_p).sum().neg() / n1.clone();
        let negative_term = (negative * log_not_p).sum().neg() / n2;

        let diff = target_offset - predicted_offset;
        let offset = (label * diff.clone() * diff).sum() / n1;

        LossComponents {
            classification: positive_term + negative_term,
            offset,
        }
    }
}
