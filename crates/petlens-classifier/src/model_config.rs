//! Model configuration structures
//!
//! A single YAML document (or the `model` section of the server
//! configuration) describes where the weights live, which network they
//! belong to, how images are prepared for it and how its output is turned
//! into one of two labels.

use petlens_core::{Error, InputSize, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fallback input resolution reported when no model could be loaded
pub const FALLBACK_INPUT_SIZE: InputSize = InputSize::square(299);

/// Largest width or height of an uploaded image accepted for decoding
pub const DEFAULT_MAX_SOURCE_DIMENSION: u32 = 8192;

/// Configuration for the classification model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name
    #[serde(default = "default_name")]
    pub name: String,

    /// Where to load the weights from
    #[serde(default)]
    pub source: ModelSource,

    /// Weight file format
    #[serde(default)]
    pub format: WeightFormat,

    /// Network architecture the weights belong to
    #[serde(default)]
    pub architecture: ArchitectureConfig,

    /// Input resolution override; the architecture default is used when absent
    #[serde(default)]
    pub input: Option<InputSize>,

    /// Image preprocessing
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    /// Output interpretation
    #[serde(default)]
    pub output: OutputConfig,

    /// Device to run inference on
    #[serde(default)]
    pub device: DeviceSpec,
}

fn default_name() -> String {
    "binary-image-classifier".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: ModelSource::default(),
            format: WeightFormat::default(),
            architecture: ArchitectureConfig::default(),
            input: None,
            preprocessing: PreprocessingConfig::default(),
            output: OutputConfig::default(),
            device: DeviceSpec::default(),
        }
    }
}

impl ModelConfig {
    /// Create a configuration for a local weights file with defaults elsewhere
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Local { path: path.into() },
            ..Default::default()
        }
    }

    /// Load model configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ModelConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid model configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load model configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read model configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&contents)
    }

    /// Input resolution the image is resized to
    pub fn input_size(&self) -> InputSize {
        self.input
            .unwrap_or_else(|| self.architecture.default_input_size())
    }

    /// Check the configuration for values the classifier cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.output.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "Threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.output.positive_label.trim().is_empty()
            || self.output.negative_label.trim().is_empty()
        {
            return Err(Error::config("Output labels must not be empty"));
        }

        if self.output.positive_label == self.output.negative_label {
            return Err(Error::config(format!(
                "Positive and negative labels must differ, both are '{}'",
                self.output.positive_label
            )));
        }

        let input = self.input_size();
        if input.width == 0 || input.height == 0 {
            return Err(Error::config(format!(
                "Input size must be non-zero, got {}x{}",
                input.width, input.height
            )));
        }

        if self.preprocessing.max_source_dimension == 0 {
            return Err(Error::config("max_source_dimension must be non-zero"));
        }

        if let ArchitectureConfig::ResNet { depth, .. } = self.architecture {
            if !RESNET_DEPTHS.contains(&depth) {
                return Err(Error::config(format!(
                    "Unsupported ResNet depth {} (expected one of {:?})",
                    depth, RESNET_DEPTHS
                )));
            }
        }

        let outputs = self.architecture.num_outputs();
        let expected = self.output.activation.expected_outputs();
        if outputs != expected {
            return Err(Error::config(format!(
                "Activation '{}' needs {} model output(s), architecture has {}",
                self.output.activation.as_str(),
                expected,
                outputs
            )));
        }

        Ok(())
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from local filesystem
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
        filename: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("best_model.safetensors"),
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::HuggingFace {
                repo,
                revision,
                filename,
            } => write!(f, "hf://{}@{}/{}", repo, revision, filename),
        }
    }
}

/// Weight file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightFormat {
    /// SafeTensors format (recommended)
    #[default]
    SafeTensors,
    /// PyTorch pickle format
    PyTorch,
}

/// Supported ResNet depths
pub const RESNET_DEPTHS: [u32; 5] = [18, 34, 50, 101, 152];

/// Model architecture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArchitectureConfig {
    /// ResNet (torchvision layout)
    #[serde(rename = "resnet")]
    ResNet {
        #[serde(default = "default_resnet_depth")]
        depth: u32,
        #[serde(default = "default_num_outputs")]
        num_outputs: usize,
    },

    /// EfficientNet (torchvision layout)
    #[serde(rename = "efficientnet")]
    EfficientNet {
        #[serde(default)]
        variant: EfficientNetVariant,
        #[serde(default = "default_num_outputs")]
        num_outputs: usize,
    },
}

fn default_resnet_depth() -> u32 {
    50
}

fn default_num_outputs() -> usize {
    1
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self::ResNet {
            depth: default_resnet_depth(),
            num_outputs: default_num_outputs(),
        }
    }
}

impl ArchitectureConfig {
    /// Resolution the architecture is usually trained at
    pub fn default_input_size(&self) -> InputSize {
        match self {
            Self::ResNet { .. } => InputSize::square(224),
            Self::EfficientNet { variant, .. } => InputSize::square(variant.resolution()),
        }
    }

    /// Width of the classification head
    pub fn num_outputs(&self) -> usize {
        match self {
            Self::ResNet { num_outputs, .. } | Self::EfficientNet { num_outputs, .. } => {
                *num_outputs
            }
        }
    }

    /// Short human-readable description, e.g. `resnet50` or `efficientnet-b0`
    pub fn describe(&self) -> String {
        match self {
            Self::ResNet { depth, .. } => format!("resnet{}", depth),
            Self::EfficientNet { variant, .. } => format!("efficientnet-{}", variant.as_str()),
        }
    }
}

/// EfficientNet scaling variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfficientNetVariant {
    #[default]
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
}

impl EfficientNetVariant {
    /// Native input resolution of the variant
    pub fn resolution(&self) -> u32 {
        match self {
            Self::B0 => 224,
            Self::B1 => 240,
            Self::B2 => 260,
            Self::B3 => 300,
            Self::B4 => 380,
            Self::B5 => 456,
            Self::B6 => 528,
            Self::B7 => 600,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::B0 => "b0",
            Self::B1 => "b1",
            Self::B2 => "b2",
            Self::B3 => "b3",
            Self::B4 => "b4",
            Self::B5 => "b5",
            Self::B6 => "b6",
            Self::B7 => "b7",
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Pixel normalization scheme
    #[serde(default)]
    pub mode: NormalizationMode,

    /// Resampling filter used when resizing
    #[serde(default)]
    pub resize_filter: ResizeFilter,

    /// Uploads wider or taller than this are rejected before decoding
    #[serde(default = "default_max_source_dimension")]
    pub max_source_dimension: u32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            mode: NormalizationMode::default(),
            resize_filter: ResizeFilter::default(),
            max_source_dimension: default_max_source_dimension(),
        }
    }
}

fn default_max_source_dimension() -> u32 {
    DEFAULT_MAX_SOURCE_DIMENSION
}

/// Pixel normalization scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Scale to [-1, 1]
    #[default]
    Tf,
    /// Scale to [0, 1], then ImageNet mean/std
    Torch,
    /// RGB to BGR, then subtract the ImageNet mean in [0, 255]
    Caffe,
    /// Scale to [0, 1]
    Unit,
}

/// Resampling filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    /// Bicubic
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

/// Output interpretation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Activation applied to the raw model output
    #[serde(default)]
    pub activation: OutputActivation,

    /// Scores strictly above this value select the positive label
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Label for scores above the threshold
    #[serde(default = "default_positive_label")]
    pub positive_label: String,

    /// Label for scores at or below the threshold
    #[serde(default = "default_negative_label")]
    pub negative_label: String,
}

fn default_threshold() -> f32 {
    0.5
}

fn default_positive_label() -> String {
    "강아지 🐶".to_string()
}

fn default_negative_label() -> String {
    "고양이 🐱".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            activation: OutputActivation::default(),
            threshold: default_threshold(),
            positive_label: default_positive_label(),
            negative_label: default_negative_label(),
        }
    }
}

/// Activation applied to the model output to obtain a probability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    /// Single logit, squashed with the logistic function
    #[default]
    Sigmoid,
    /// Two logits, probability of the second class
    Softmax,
    /// Single value that already is a probability
    Identity,
}

impl OutputActivation {
    /// Number of model outputs the activation expects
    pub fn expected_outputs(&self) -> usize {
        match self {
            Self::Sigmoid | Self::Identity => 1,
            Self::Softmax => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sigmoid => "sigmoid",
            Self::Softmax => "softmax",
            Self::Identity => "identity",
        }
    }
}

/// Device specification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        index: Option<usize>,
    },
    Metal {
        index: Option<usize>,
    },
}

impl std::fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda { index } => write!(f, "cuda:{}", index.unwrap_or(0)),
            Self::Metal { index } => write!(f, "metal:{}", index.unwrap_or(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();

        assert_eq!(config.architecture.describe(), "resnet50");
        assert_eq!(config.input_size(), InputSize::square(224));
        assert_eq!(config.output.threshold, 0.5);
        assert_eq!(config.preprocessing.mode, NormalizationMode::Tf);
        assert_eq!(
            config.preprocessing.max_source_dimension,
            DEFAULT_MAX_SOURCE_DIMENSION
        );
        assert_eq!(config.device, DeviceSpec::Cpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: "cats-vs-dogs"
source:
  type: huggingface
  repo: "example/cats-vs-dogs"
  filename: "model.safetensors"
architecture:
  type: efficientnet
  variant: b3
  num_outputs: 2
input:
  width: 256
  height: 256
preprocessing:
  mode: torch
  resize_filter: lanczos3
  max_source_dimension: 4096
output:
  activation: softmax
  threshold: 0.6
  positive_label: "dog"
  negative_label: "cat"
device:
  cuda:
    index: 1
"#;

        let config = ModelConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "cats-vs-dogs");
        assert_eq!(
            config.source,
            ModelSource::HuggingFace {
                repo: "example/cats-vs-dogs".to_string(),
                revision: "main".to_string(),
                filename: "model.safetensors".to_string(),
            }
        );
        assert_eq!(config.architecture.describe(), "efficientnet-b3");
        assert_eq!(config.input_size(), InputSize::new(256, 256));
        assert_eq!(config.preprocessing.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.preprocessing.max_source_dimension, 4096);
        assert_eq!(config.output.activation, OutputActivation::Softmax);
        assert_eq!(config.device.to_string(), "cuda:1");
    }

    #[test]
    fn test_architecture_default_input_size() {
        let yaml = r#"
architecture:
  type: efficientnet
  variant: b4
"#;
        let config = ModelConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.input_size(), InputSize::square(380));
    }

    #[test]
    fn test_local_source() {
        let yaml = r#"
source:
  type: local
  path: "./models/pets.safetensors"
architecture:
  type: resnet
  depth: 18
"#;
        let config = ModelConfig::from_yaml(yaml).unwrap();
        match &config.source {
            ModelSource::Local { path } => {
                assert_eq!(path.to_str().unwrap(), "./models/pets.safetensors");
            }
            _ => panic!("Expected local source"),
        }
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let mut config = ModelConfig::default();
        config.output.threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_softmax_with_single_output() {
        let mut config = ModelConfig::default();
        config.output.activation = OutputActivation::Softmax;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_resnet_depth() {
        let yaml = r#"
architecture:
  type: resnet
  depth: 42
"#;
        assert!(ModelConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_identical_labels() {
        let mut config = ModelConfig::default();
        config.output.negative_label = config.output.positive_label.clone();
        assert!(config.validate().is_err());
    }
}
