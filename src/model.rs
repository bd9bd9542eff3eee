//! QuasarNET - the line-detection network.
//!
//! `QuasarNetConfig` describes the network and `QuasarNet` holds the
//! initialized layers. The topology is fixed: four strided convolution
//! stages, a shared fully connected embedding, and one detection head per
//! spectral line.

use crate::errors::ModelError;
use crate::layers::{
    Activation, ConvStage, ConvStageConfig, Dense, DenseConfig, FeatureNorm, LineHead,
};
use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};
use serde::{Deserialize, Serialize};

/// Number of convolution stages.
pub const CONV_STAGES: usize = 4;
/// Filters per convolution stage.
pub const CONV_FILTERS: usize = 100;
/// Convolution kernel width.
pub const CONV_KERNEL_SIZE: usize = 10;
/// Convolution stride.
pub const CONV_STRIDE: usize = 2;
/// Width of the shared feature embedding.
pub const FC_UNITS: usize = 100;

/// Shape of one input spectrum, excluding the batch dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    /// Number of flux samples.
    pub length: usize,
    /// Number of channels per sample.
    pub channels: usize,
}

impl InputShape {
    /// Creates an input shape.
    pub fn new(length: usize, channels: usize) -> Self {
        Self { length, channels }
    }

    /// Single-channel spectrum of the given length.
    pub fn spectrum(length: usize) -> Self {
        Self::new(length, 1)
    }
}

/// Configuration for building a QuasarNet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuasarNetConfig {
    /// Shape of the input spectra.
    pub input_shape: InputShape,
    /// Number of boxes the spectrum is divided into.
    #[serde(default = "default_boxes")]
    pub boxes: usize,
    /// Number of independently detected lines.
    #[serde(default = "default_nlines")]
    pub nlines: usize,
    /// L2 strength on the convolution kernels.
    #[serde(default)]
    pub reg_conv: f64,
    /// L2 strength for fully connected layers. Recorded but not applied.
    #[serde(default)]
    pub reg_fc: f64,
}

fn default_boxes() -> usize {
    13
}

fn default_nlines() -> usize {
    1
}

impl QuasarNetConfig {
    /// Creates a configuration with default boxes, lines and regularization.
    pub fn new(input_shape: InputShape) -> Self {
        Self {
            input_shape,
            boxes: default_boxes(),
            nlines: default_nlines(),
            reg_conv: 0.0,
            reg_fc: 0.0,
        }
    }

    /// Sets the number of boxes.
    pub fn boxes(mut self, boxes: usize) -> Self {
        self.boxes = boxes;
        self
    }

    /// Sets the number of detected lines.
    pub fn nlines(mut self, nlines: usize) -> Self {
        self.nlines = nlines;
        self
    }

    /// Sets the convolution L2 strength.
    pub fn reg_conv(mut self, reg_conv: f64) -> Self {
        self.reg_conv = reg_conv;
        self
    }

    /// Sets the fully connected L2 strength.
    pub fn reg_fc(mut self, reg_fc: f64) -> Self {
        self.reg_fc = reg_fc;
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let invalid = |message: String| Err(ModelError::InvalidLayerConfig { message });

        if self.input_shape.length == 0 || self.input_shape.channels == 0 {
            return invalid(format!(
                "input shape ({}, {}) has a zero dimension",
                self.input_shape.length, self.input_shape.channels
            ));
        }
        if self.boxes == 0 {
            return invalid("boxes must be positive".to_string());
        }
        if self.nlines == 0 {
            return invalid("nlines must be positive".to_string());
        }
        for (name, value) in [("reg_conv", self.reg_conv), ("reg_fc", self.reg_fc)] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be finite and non-negative, got {value}"));
            }
        }
        Ok(())
    }

    /// Builds the QuasarNet with the given device.
    pub fn build<B: Backend>(&self, device: &B::Device) -> Result<QuasarNet<B>, ModelError> {
        self.validate()?;

        let mut stages = Vec::with_capacity(CONV_STAGES);
        let mut length = self.input_shape.length;
        let mut channels = self.input_shape.channels;
        for stage in 1..=CONV_STAGES {
            let layer = ConvStageConfig::new(channels, CONV_FILTERS, CONV_KERNEL_SIZE, CONV_STRIDE)
                .init(stage, length, device)?;
            log::debug!("conv_{}: length {} -> {}", stage, length, layer.output_length());
            length = layer.output_length();
            channels = layer.filters();
            stages.push(layer);
        }

        if self.reg_fc != 0.0 {
            log::warn!(
                "reg_fc = {} is accepted but not applied to any fully connected layer",
                self.reg_fc
            );
        }

        let heads = (0..self.nlines)
            .map(|_| LineHead::new(FC_UNITS, self.boxes, device))
            .collect();

        let model = QuasarNet {
            stages,
            fc_common: DenseConfig::new(length * channels, FC_UNITS).init(device),
            fc_norm: FeatureNorm::new(FC_UNITS, device),
            heads,
            input_length: self.input_shape.length,
            input_channels: self.input_shape.channels,
            boxes: self.boxes,
            reg_conv: self.reg_conv as f32,
            reg_fc: self.reg_fc as f32,
        };
        log::info!(
            "Built QuasarNET: input ({}, {}), {} boxes, {} lines, {} parameters",
            self.input_shape.length,
            self.input_shape.channels,
            self.boxes,
            self.nlines,
            model.num_params()
        );
        Ok(model)
    }
}

/// The QuasarNET model.
///
/// Maps `[batch, length, channels]` spectra to one `[batch, 2 * boxes]`
/// tensor per detected line.
#[derive(Module, Debug)]
pub struct QuasarNet<B: Backend> {
    stages: Vec<ConvStage<B>>,
    fc_common: Dense<B>,
    fc_norm: FeatureNorm<B>,
    heads: Vec<LineHead<B>>,
    input_length: usize,
    input_channels: usize,
    boxes: usize,
    reg_conv: f32,
    reg_fc: f32,
}

impl<B: Backend> QuasarNet<B> {
    /// Creates a new configuration builder.
    pub fn config(input_shape: InputShape) -> QuasarNetConfig {
        QuasarNetConfig::new(input_shape)
    }

    /// Runs the network, returning one output per line head.
    pub fn forward(&self, input: Tensor<B, 3>) -> Vec<Tensor<B, 2>> {
        let features = self.embed(input);
        self.heads
            .iter()
            .map(|head| head.forward(features.clone()))
            .collect()
    }

    /// Runs the network on single-channel `[batch, length]` spectra.
    pub fn forward_spectra(&self, spectra: Tensor<B, 2>) -> Vec<Tensor<B, 2>> {
        self.forward(spectra.unsqueeze_dim(2))
    }

    /// Shared `[batch, FC_UNITS]` embedding feeding every head.
    pub fn embed(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        // Convolutions run channel-first; flattening goes back to channel-last order.
        let mut x = input.swap_dims(1, 2);
        for stage in &self.stages {
            x = stage.forward(x);
        }
        let [batch, channels, length] = x.dims();
        let flat = x.swap_dims(1, 2).reshape([batch, length * channels]);

        let x = self.fc_common.forward(flat);
        Activation::Relu.apply(self.fc_norm.forward(x))
    }

    /// L2 penalty on the convolution kernels: `reg_conv * sum(w^2)`.
    pub fn regularization_loss(&self) -> Tensor<B, 1> {
        let device = self.fc_common.kernel().device();
        self.stages
            .iter()
            .fold(Tensor::zeros([1], &device), |acc, stage| {
                acc + stage.kernel_sq_norm()
            })
            .mul_scalar(self.reg_conv)
    }

    /// Names of the outputs, in the order returned by `forward`.
    pub fn output_names(&self) -> Vec<String> {
        (0..self.heads.len())
            .map(|i| format!("conc_box_{}", i))
            .collect()
    }

    /// Returns the input shape.
    pub fn input_shape(&self) -> InputShape {
        InputShape::new(self.input_length, self.input_channels)
    }

    /// Returns the number of boxes.
    pub fn boxes(&self) -> usize {
        self.boxes
    }

    /// Returns the number of detected lines.
    pub fn nlines(&self) -> usize {
        self.heads.len()
    }

    /// Returns the number of output tensors.
    pub fn num_outputs(&self) -> usize {
        self.heads.len()
    }

    /// Returns the width of each output tensor.
    pub fn output_size(&self) -> usize {
        2 * self.boxes
    }

    /// Returns the spatial length after the last convolution stage.
    pub fn feature_length(&self) -> usize {
        self.stages
            .last()
            .map(|s| s.output_length())
            .unwrap_or(self.input_length)
    }

    /// Returns the configured convolution L2 strength.
    pub fn reg_conv(&self) -> f32 {
        self.reg_conv
    }

    /// Returns the configured fully connected L2 strength.
    pub fn reg_fc(&self) -> f32 {
        self.reg_fc
    }

    /// Exports a layer-by-layer summary as pretty-printed JSON.
    pub fn export_summary(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    /// Describes every layer with its output shape and parameter count.
    pub fn summary(&self) -> ModelSummary {
        let mut layers = vec![LayerSummary::new(
            "input",
            "InputLayer",
            vec![self.input_length, self.input_channels],
            None,
            0,
        )];

        for (i, stage) in self.stages.iter().enumerate() {
            let shape = vec![stage.output_length(), stage.filters()];
            layers.push(LayerSummary::new(
                &format!("conv_{}", i + 1),
                "Conv1D",
                shape.clone(),
                Some(Activation::Linear),
                stage.conv_params(),
            ));
            layers.push(LayerSummary::new(
                &format!("conv_{}_norm", i + 1),
                "BatchNormalization",
                shape,
                Some(Activation::Relu),
                stage.norm_params(),
            ));
        }

        layers.push(LayerSummary::new(
            "flatten",
            "Flatten",
            vec![self.fc_common.input_size()],
            None,
            0,
        ));
        layers.push(LayerSummary::new(
            "fc_common",
            "Dense",
            vec![self.fc_common.output_size()],
            Some(self.fc_common.activation()),
            self.fc_common.num_params(),
        ));
        layers.push(LayerSummary::new(
            "fc_activation",
            "BatchNormalization",
            vec![self.fc_norm.num_features()],
            Some(Activation::Relu),
            self.fc_norm.num_params(),
        ));

        for (i, head) in self.heads.iter().enumerate() {
            for (name, dense) in [("fc_box", head.box_layer()), ("fc_offset", head.offset_layer())] {
                layers.push(LayerSummary::new(
                    &format!("{}_{}", name, i),
                    "Dense",
                    vec![dense.output_size()],
                    Some(dense.activation()),
                    dense.num_params(),
                ));
            }
            layers.push(LayerSummary::new(
                &format!("conc_box_{}", i),
                "Concatenate",
                vec![head.output_size()],
                None,
                0,
            ));
        }

        ModelSummary {
            name: "QuasarNET".to_string(),
            input_shape: self.input_shape(),
            boxes: self.boxes,
            nlines: self.heads.len(),
            layers,
            outputs: self.output_names(),
            total_params: self.num_params(),
        }
    }
}

/// Serializable description of a built model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub input_shape: InputShape,
    pub boxes: usize,
    pub nlines: usize,
    pub layers: Vec<LayerSummary>,
    pub outputs: Vec<String>,
    pub total_params: usize,
}

/// One row of a [`ModelSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub kind: String,
    /// Output shape without the batch dimension.
    pub output_shape: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<Activation>,
    pub params: usize,
}

impl LayerSummary {
    fn new(
        name: &str,
        kind: &str,
        output_shape: Vec<usize>,
        activation: Option<Activation>,
        params: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            output_shape,
            activation,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_config_defaults() {
        let config = QuasarNetConfig::new(InputShape::spectrum(443));

        assert_eq!(config.boxes, 13);
        assert_eq!(config.nlines, 1);
        assert_eq!(config.reg_conv, 0.0);
        assert_eq!(config.reg_fc, 0.0);
    }

    #[test]
    fn test_config_builder() {
        let config = QuasarNetConfig::new(InputShape::new(200, 2))
            .boxes(7)
            .nlines(3)
            .reg_conv(1e-4)
            .reg_fc(1e-3);

        assert_eq!(config.input_shape, InputShape::new(200, 2));
        assert_eq!(config.boxes, 7);
        assert_eq!(config.nlines, 3);
        assert!((config.reg_conv - 1e-4).abs() < 1e-12);
        assert!((config.reg_fc - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn test_config_json_defaults_and_roundtrip() {
        let config =
            QuasarNetConfig::from_json(r#"{"input_shape": {"length": 443, "channels": 1}}"#)
                .expect("minimal config should parse");
        assert_eq!(config, QuasarNetConfig::new(InputShape::spectrum(443)));

        let custom = config.nlines(4).reg_conv(0.5);
        let parsed = QuasarNetConfig::from_json(&custom.to_json().unwrap()).unwrap();
        assert_eq!(parsed, custom);

        assert!(matches!(
            QuasarNetConfig::from_json("{"),
            Err(ModelError::SerializationError(_))
        ));
    }

    #[test]
    fn test_build_and_forward_shapes() {
        let device = <TestBackend as Backend>::Device::default();
        let model: QuasarNet<TestBackend> = QuasarNetConfig::new(InputShape::spectrum(200))
            .boxes(5)
            .nlines(2)
            .build(&device)
            .expect("Failed to build model");

        // 200 -> 96 -> 44 -> 18 -> 5
        assert_eq!(model.feature_length(), 5);
        assert_eq!(model.num_outputs(), 2);
        assert_eq!(model.output_size(), 10);

        let outputs = model.forward(Tensor::<TestBackend, 3>::zeros([3, 200, 1], &device));
        assert_eq!(outputs.len(), 2);
        for output in outputs {
            assert_eq!(output.dims(), [3, 10]);
        }
    }

    #[test]
    fn test_forward_spectra_matches_forward() {
        let device = <TestBackend as Backend>::Device::default();
        let model: QuasarNet<TestBackend> = QuasarNetConfig::new(InputShape::spectrum(150))
            .boxes(3)
            .build(&device)
            .unwrap();

        let spectra = Tensor::<TestBackend, 2>::ones([2, 150], &device);
        let a: Vec<f32> = model.forward_spectra(spectra.clone())[0]
            .to_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = model.forward(spectra.reshape([2, 150, 1]))[0]
            .to_data()
            .to_vec()
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_output_names() {
        let device = <TestBackend as Backend>::Device::default();
        let model: QuasarNet<TestBackend> = QuasarNetConfig::new(InputShape::spectrum(200))
            .nlines(3)
            .build(&device)
            .unwrap();

        assert_eq!(
            model.output_names(),
            vec!["conc_box_0", "conc_box_1", "conc_box_2"]
        );
    }

    #[test]
    fn test_invalid_configs() {
        let device = <TestBackend as Backend>::Device::default();
        let base = QuasarNetConfig::new(InputShape::spectrum(200));

        let cases = [
            base.clone().boxes(0),
            base.clone().nlines(0),
            base.clone().reg_conv(-1.0),
            base.clone().reg_fc(f64::NAN),
            QuasarNetConfig::new(InputShape::new(200, 0)),
        ];
        for config in cases {
            let result: Result<QuasarNet<TestBackend>, _> = config.build(&device);
            assert!(matches!(result, Err(ModelError::InvalidLayerConfig { .. })));
        }
    }

    #[test]
    fn test_input_too_short() {
        let device = <TestBackend as Backend>::Device::default();

        // 30 -> 11 -> 1, then the third stage has nothing to convolve.
        let result: Result<QuasarNet<TestBackend>, _> =
            QuasarNetConfig::new(InputShape::spectrum(30)).build(&device);
        assert!(matches!(
            result,
            Err(ModelError::InputTooShort { length: 1, stage: 3 })
        ));
    }

    #[test]
    fn test_regularization_scales_with_reg_conv() {
        let device = <TestBackend as Backend>::Device::default();

        let unregularized: QuasarNet<TestBackend> = QuasarNetConfig::new(InputShape::spectrum(200))
            .build(&device)
            .unwrap();
        let zero: f32 = unregularized.regularization_loss().into_scalar();
        assert_eq!(zero, 0.0);

        let model: QuasarNet<TestBackend> = QuasarNetConfig::new(InputShape::spectrum(200))
            .reg_conv(0.5)
            .reg_fc(0.5)
            .build(&device)
            .unwrap();
        let expected: f32 = model
            .stages
            .iter()
            .map(|s| s.kernel_sq_norm().into_scalar())
            .sum::<f32>()
            * 0.5;
        let penalty: f32 = model.regularization_loss().into_scalar();

        assert!(penalty > 0.0);
        assert!((penalty - expected).abs() < 1e-3 * expected.max(1.0));
    }

    #[test]
    fn test_summary() {
        let device = <TestBackend as Backend>::Device::default();
        let model: QuasarNet<TestBackend> = QuasarNetConfig::new(InputShape::spectrum(200))
            .boxes(4)
            .nlines(2)
            .build(&device)
            .unwrap();

        let summary = model.summary();
        let find = |name: &str| {
            summary
                .layers
                .iter()
                .find(|l| l.name == name)
                .unwrap_or_else(|| panic!("missing layer {name}"))
        };

        assert_eq!(find("conv_1").output_shape, vec![96, 100]);
        assert_eq!(find("conv_1").params, 10 * 100 + 100);
        assert_eq!(find("conv_4").output_shape, vec![5, 100]);
        assert_eq!(find("flatten").output_shape, vec![500]);
        assert_eq!(find("fc_common").params, 500 * 100 + 100);
        assert_eq!(find("fc_box_1").activation, Some(Activation::Sigmoid));
        assert_eq!(find("fc_offset_0").params, 100 * 4 + 4);
        assert_eq!(find("conc_box_1").output_shape, vec![8]);
        assert_eq!(summary.outputs, vec!["conc_box_0", "conc_box_1"]);

        let json = model.export_summary().unwrap();
        assert!(json.contains("\"QuasarNET\""));
        assert!(json.contains("\"Conv1D\""));
    }
}
