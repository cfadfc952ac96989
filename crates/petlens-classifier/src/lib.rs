//! PetLens Classifier
//!
//! Binary image classification on top of Candle.
//!
//! An uploaded image goes through three steps:
//! - preprocessing: decode, convert to RGB, resize, normalize into an NCHW tensor
//! - inference: a pre-trained network produces the positive-class probability
//! - decision: a fixed threshold maps the probability to one of two labels
//!
//! Models run on CPU by default; CUDA and Metal are selected through configuration.

pub mod classifier;
pub mod decision;
pub mod model_config;
pub mod model_loader;
pub mod preprocess;

pub use classifier::{unloaded_info, BinaryClassifier, ImageModel};
pub use decision::Decision;
pub use model_config::{
    ArchitectureConfig, DeviceSpec, EfficientNetVariant, ModelConfig, ModelSource,
    NormalizationMode, OutputActivation, OutputConfig, PreprocessingConfig, ResizeFilter,
    WeightFormat,
};
pub use model_loader::{artifact_present, LoadedModel};
pub use preprocess::Preprocessor;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{BinaryClassifier, ImageModel};
    pub use crate::decision::Decision;
    pub use crate::model_config::ModelConfig;
    pub use crate::model_loader::LoadedModel;
    pub use crate::preprocess::Preprocessor;
}
