//! Total training objective across detection heads.

use super::BoxLoss;
use crate::errors::ModelError;
use crate::model::QuasarNet;
use burn::tensor::{Tensor, backend::Backend};

/// Sums the box loss of every head and adds the model's weight penalty.
///
/// `predictions` are the outputs of [`QuasarNet::forward`]; `targets` holds one
/// ground-truth tensor per head, in the same order.
pub fn objective<B: Backend>(
    model: &QuasarNet<B>,
    loss: &BoxLoss,
    predictions: Vec<Tensor<B, 2>>,
    targets: Vec<Tensor<B, 2>>,
) -> Result<Tensor<B, 1>, ModelError> {
    if predictions.len() != model.num_outputs() {
        return Err(ModelError::ShapeMismatch {
            expected: model.num_outputs(),
            actual: predictions.len(),
        });
    }
    if targets.len() != predictions.len() {
        return Err(ModelError::ShapeMismatch {
            expected: predictions.len(),
            actual: targets.len(),
        });
    }
    for tensor in predictions.iter().chain(&targets) {
        let width = tensor.dims()[1];
        if width != model.output_size() {
            return Err(ModelError::ShapeMismatch {
                expected: model.output_size(),
                actual: width,
            });
        }
    }

    Ok(targets
        .into_iter()
        .zip(predictions)
        .fold(model.regularization_loss(), |total, (target, prediction)| {
            total + loss.compute(target, prediction)
        }))
}
