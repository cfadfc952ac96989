//! Image model trait and the binary classifier built on top of it

use crate::decision::Decision;
use crate::model_config::ModelConfig;
use crate::model_loader::LoadedModel;
use crate::preprocess::Preprocessor;
use async_trait::async_trait;
use candle_core::Tensor;
use petlens_core::{Error, ModelInfo, Prediction, Result};
use std::sync::Arc;
use std::time::Instant;

/// Trait for models that score a single preprocessed image
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Probability (0.0-1.0) that the `(1, 3, H, W)` input belongs to the positive class
    async fn predict(&self, input: Tensor) -> Result<f32>;

    /// Get the model name
    fn name(&self) -> &str;

    /// Architecture description
    fn architecture(&self) -> String;

    /// Device the model runs on
    fn device(&self) -> String {
        "cpu".to_string()
    }
}

/// Preprocessing, a model and a decision rule wired together
#[derive(Clone)]
pub struct BinaryClassifier {
    model: Arc<dyn ImageModel>,
    preprocessor: Preprocessor,
    decision: Decision,
}

impl BinaryClassifier {
    /// Create a classifier from its parts
    pub fn new(model: Arc<dyn ImageModel>, preprocessor: Preprocessor, decision: Decision) -> Self {
        Self {
            model,
            preprocessor,
            decision,
        }
    }

    /// Load the configured model and build the classifier around it
    ///
    /// Loading is blocking (file IO, optional download, weight mapping).
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        let model = LoadedModel::load(config)?;
        Ok(Self::with_model(Arc::new(model), config))
    }

    /// Build the classifier around an already constructed model
    pub fn with_model(model: Arc<dyn ImageModel>, config: &ModelConfig) -> Self {
        let preprocessor = Preprocessor::from_config(config.input_size(), &config.preprocessing);
        Self::new(model, preprocessor, Decision::from_config(&config.output))
    }

    /// Classify encoded image bytes
    ///
    /// Decoding and resizing run on the blocking pool, like the forward pass.
    pub async fn classify(&self, bytes: &[u8]) -> Result<Prediction> {
        let start = Instant::now();

        let preprocessor = self.preprocessor.clone();
        let bytes = bytes.to_vec();
        let input = tokio::task::spawn_blocking(move || preprocessor.prepare(&bytes))
            .await
            .map_err(|e| Error::internal(format!("Preprocessing task failed: {}", e)))??;
        let score = self.model.predict(input).await?;
        let prediction = self.decision.apply(score)?;

        let latency_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            model = self.model.name(),
            score,
            label = %prediction.prediction,
            latency_us,
            "Image classified"
        );

        Ok(prediction.with_latency(latency_us))
    }

    /// Describe the loaded model
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            loaded: true,
            name: self.model.name().to_string(),
            architecture: self.model.architecture(),
            input: self.preprocessor.size(),
            positive_label: self.decision.positive_label().to_string(),
            negative_label: self.decision.negative_label().to_string(),
            threshold: self.decision.threshold(),
            device: self.model.device(),
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }
}

/// Model description used when no model is loaded
pub fn unloaded_info(config: &ModelConfig) -> ModelInfo {
    ModelInfo {
        loaded: false,
        name: config.name.clone(),
        architecture: config.architecture.describe(),
        input: config
            .input
            .unwrap_or(crate::model_config::FALLBACK_INPUT_SIZE),
        positive_label: config.output.positive_label.clone(),
        negative_label: config.output.negative_label.clone(),
        threshold: config.output.threshold,
        device: config.device.to_string(),
    }
}

/// Extract a single probability from the raw model output
pub(crate) fn probability_from_output(
    output: &Tensor,
    activation: crate::model_config::OutputActivation,
) -> Result<f32> {
    use crate::model_config::OutputActivation;

    let values = output
        .flatten_all()
        .and_then(|t| t.to_dtype(candle_core::DType::F32))
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| Error::inference(format!("Failed to read model output: {}", e)))?;

    let expected = activation.expected_outputs();
    if values.len() != expected {
        return Err(Error::inference(format!(
            "Expected {} output value(s) for '{}' activation, got {}",
            expected,
            activation.as_str(),
            values.len()
        )));
    }

    let probability = match activation {
        OutputActivation::Identity => values[0],
        OutputActivation::Sigmoid => 1.0 / (1.0 + (-values[0]).exp()),
        OutputActivation::Softmax => {
            let max = values[0].max(values[1]);
            let e0 = (values[0] - max).exp();
            let e1 = (values[1] - max).exp();
            e1 / (e0 + e1)
        }
    };

    Ok(probability)
}
