//! # quasarnet
//!
//! Convolutional detection of emission lines in quasar spectra, built on the
//! Burn framework.
//!
//! The spectrum is divided into a fixed number of boxes. For every line it
//! tracks, the network predicts the probability that the line centre falls in
//! each box, together with the position of the centre inside that box.
//!
//! ## Features
//!
//! - **Fixed topology**: four strided convolution stages, a shared 100-unit
//!   embedding and one detection head per line.
//! - **Box loss**: class-balanced cross-entropy on box confidences plus a
//!   masked squared error on offsets.
//! - **Target helpers**: encode line positions into ground truth and decode
//!   head outputs back into positions.
//!
//! ## Example
//!
//! ```
//! use quasarnet::prelude::*;
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! type Backend = NdArray;
//!
//! let device = <Backend as burn::tensor::backend::Backend>::Device::default();
//!
//! let model: QuasarNet<Backend> = QuasarNetConfig::new(InputShape::spectrum(200))
//!     .boxes(13)
//!     .nlines(2)
//!     .build(&device)
//!     .expect("Failed to build model");
//!
//! let spectra = Tensor::<Backend, 2>::zeros([4, 200], &device);
//! let outputs = model.forward_spectra(spectra);
//! assert_eq!(outputs.len(), 2);
//! assert_eq!(outputs[0].dims(), [4, 26]);
//!
//! let target = encode_line(0.42, 13).unwrap();
//! let targets = targets_to_tensor::<Backend>(&vec![target; 4], &device).unwrap();
//! let loss = BoxLoss::new().compute(targets, outputs[0].clone());
//! assert!(loss.into_scalar() > 0.0);
//! ```

pub mod detection;
pub mod errors;
pub mod layers;
pub mod model;
pub mod training;

// Re-exports for convenience
pub use errors::ModelError;
pub use model::{InputShape, QuasarNet, QuasarNetConfig};
pub use training::{BoxLoss, objective};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::detection::{
        Detection, decode, decode_batch, encode_absent, encode_line, targets_to_tensor,
    };
    pub use crate::errors::ModelError;
    pub use crate::layers::Activation;
    pub use crate::model::{InputShape, ModelSummary, QuasarNet, QuasarNetConfig};
    pub use crate::training::{BoxLoss, LossComponents, objective};
}
