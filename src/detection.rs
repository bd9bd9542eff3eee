//! Conversion between line positions and box-detection vectors.
//!
//! A spectrum is divided into `boxes` equal boxes. A line centred at the
//! normalized position `p` in `[0, 1]` belongs to box `floor(p * boxes)` with
//! offset `p * boxes - index` inside that box.

use crate::errors::ModelError;
use burn::tensor::{Tensor, backend::Backend};

/// A line located from one head output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Box with the highest confidence.
    pub box_index: usize,
    /// Confidence of that box.
    pub confidence: f32,
    /// Predicted offset inside the box.
    pub offset: f32,
    /// Normalized line position, `(box_index + offset) / boxes`.
    pub position: f32,
}

/// Builds the ground-truth vector for a line at normalized `position`.
pub fn encode_line(position: f32, boxes: usize) -> Result<Vec<f32>, ModelError> {
    if boxes == 0 {
        return Err(ModelError::InvalidTarget {
            message: "boxes must be positive".to_string(),
        });
    }
    if !position.is_finite() || !(0.0..=1.0).contains(&position) {
        return Err(ModelError::InvalidTarget {
            message: format!("line position {} is outside [0, 1]", position),
        });
    }

    let scaled = position * boxes as f32;
    let index = (scaled.floor() as usize).min(boxes - 1);

    let mut target = vec![0.0; 2 * boxes];
    target[index] = 1.0;
    target[boxes + index] = scaled - index as f32;
    Ok(target)
}

/// Ground-truth vector for a spectrum without the line.
pub fn encode_absent(boxes: usize) -> Vec<f32> {
    vec![0.0; 2 * boxes]
}

/// Decodes one head output into the most confident box.
///
/// NaN confidences are ignored.
pub fn decode(output: &[f32]) -> Result<Detection, ModelError> {
    if output.len() % 2 != 0 {
        return Err(ModelError::OddOutputWidth(output.len()));
    }
    let boxes = output.len() / 2;
    let (confidences, offsets) = output.split_at(boxes);

    let (box_index, confidence) = confidences
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, c)| !c.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, c)| match best {
            Some((_, top)) if top >= c => best,
            _ => Some((i, c)),
        })
        .ok_or_else(|| ModelError::InvalidTarget {
            message: "detection output has no valid confidence".to_string(),
        })?;

    let offset = offsets[box_index];
    Ok(Detection {
        box_index,
        confidence,
        offset,
        position: (box_index as f32 + offset) / boxes as f32,
    })
}

/// Decodes every row of a `[batch, 2 * boxes]` head output.
pub fn decode_batch<B: Backend>(output: Tensor<B, 2>) -> Result<Vec<Detection>, ModelError> {
    let [_, width] = output.dims();
    if width % 2 != 0 {
        return Err(ModelError::OddOutputWidth(width));
    }
    if width == 0 {
        return Err(ModelError::InvalidTarget {
            message: "detection output has no valid confidence".to_string(),
        });
    }

    let values: Vec<f32> = output
        .to_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| ModelError::InvalidTarget {
            message: format!("{:?}", e),
        })?;
    values.chunks(width).map(decode).collect()
}

/// Stacks per-spectrum target vectors into a `[batch, width]` tensor.
pub fn targets_to_tensor<B: Backend>(
    rows: &[Vec<f32>],
    device: &B::Device,
) -> Result<Tensor<B, 2>, ModelError> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    if let Some(row) = rows.iter().find(|r| r.len() != width) {
        return Err(ModelError::ShapeMismatch {
            expected: width,
            actual: row.len(),
        });
    }

    let data: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Ok(Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([rows.len(), width]))
}
