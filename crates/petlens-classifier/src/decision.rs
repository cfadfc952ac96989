//! Mapping of a positive-class probability to one of two labels

use crate::model_config::OutputConfig;
use petlens_core::{Error, Prediction, Result};

/// Fixed-threshold binary decision rule
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    threshold: f32,
    positive_label: String,
    negative_label: String,
}

impl Decision {
    /// Create a new decision rule
    pub fn new(
        threshold: f32,
        positive_label: impl Into<String>,
        negative_label: impl Into<String>,
    ) -> Self {
        Self {
            threshold,
            positive_label: positive_label.into(),
            negative_label: negative_label.into(),
        }
    }

    /// Create a decision rule from output configuration
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(
            config.threshold,
            config.positive_label.clone(),
            config.negative_label.clone(),
        )
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn positive_label(&self) -> &str {
        &self.positive_label
    }

    pub fn negative_label(&self) -> &str {
        &self.negative_label
    }

    /// Pick a label for `score`
    ///
    /// Scores strictly above the threshold select the positive label with
    /// the score as confidence; anything else selects the negative label
    /// with `1 - score`.
    pub fn apply(&self, score: f32) -> Result<Prediction> {
        if score.is_nan() {
            return Err(Error::inference("Model produced a NaN score"));
        }

        let score = score.clamp(0.0, 1.0);
        let prediction = if score > self.threshold {
            Prediction::new(self.positive_label.clone(), score, score)
        } else {
            Prediction::new(self.negative_label.clone(), 1.0 - score, score)
        };

        Ok(prediction)
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default())
    }
}
