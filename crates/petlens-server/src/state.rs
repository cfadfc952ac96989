use crate::settings::AppConfig;
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use petlens_classifier::{artifact_present, unloaded_info, BinaryClassifier};
use petlens_core::ModelInfo;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<AppConfig>,

    /// Loaded classifier; `None` when the model artifact was absent at startup
    pub classifier: Option<Arc<BinaryClassifier>>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, classifier: Option<BinaryClassifier>) -> Self {
        Self {
            config: Arc::new(config),
            classifier: classifier.map(Arc::new),
            metrics_handle: None,
        }
    }

    /// Attach the metrics handle served by `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Load the model once, leaving it unloaded if the artifact is absent
    ///
    /// An artifact that exists but cannot be loaded is an error.
    pub async fn load(config: AppConfig) -> anyhow::Result<Self> {
        let model_config = config.model.clone();
        let source = model_config.source.to_string();

        if !artifact_present(&model_config) {
            tracing::warn!(
                "Model not found at {}; predictions are unavailable until it is provided",
                source
            );
            return Ok(Self::new(config, None));
        }

        let classifier =
            tokio::task::spawn_blocking(move || BinaryClassifier::from_config(&model_config))
                .await
                .context("Model loading task failed")?
                .with_context(|| format!("Failed to load model from {}", source))?;

        let input = classifier.preprocessor().size();
        tracing::info!(
            "Model loaded: {} ({}), expected input {}x{}",
            source,
            config.model.architecture.describe(),
            input.width,
            input.height
        );

        Ok(Self::new(config, Some(classifier)))
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    /// Describe the model, loaded or not
    pub fn model_info(&self) -> ModelInfo {
        match &self.classifier {
            Some(classifier) => classifier.info(),
            None => unloaded_info(&self.config.model),
        }
    }
}
