//! Core types for PetLens

use serde::{Deserialize, Serialize};

/// Outcome of classifying one image
///
/// Serializes to the `/predict` response body: only the label and the
/// confidence are part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Label chosen by the decision rule
    pub prediction: String,

    /// Confidence in the chosen label (0.0-1.0)
    pub confidence: f32,

    /// Raw positive-class probability produced by the model
    #[serde(skip)]
    pub score: f32,

    /// Time spent in preprocessing and the forward pass, in microseconds
    #[serde(skip)]
    pub latency_us: u64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: impl Into<String>, confidence: f32, score: f32) -> Self {
        Self {
            prediction: label.into(),
            confidence,
            score,
            latency_us: 0,
        }
    }

    /// Attach the measured latency
    pub fn with_latency(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }
}

/// Input resolution expected by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    /// Create a new input size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square input size
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }
}

/// Description of the configured model, as exposed by the info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Whether a model is loaded and able to serve predictions
    pub loaded: bool,

    /// Model name
    pub name: String,

    /// Architecture description (e.g. `resnet50`)
    pub architecture: String,

    /// Input resolution the image is resized to
    pub input: InputSize,

    /// Label reported when the score exceeds the threshold
    pub positive_label: String,

    /// Label reported otherwise
    pub negative_label: String,

    /// Decision threshold on the positive-class probability
    pub threshold: f32,

    /// Device the model runs on
    pub device: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_wire_format() {
        let p = Prediction::new("cat", 0.75, 0.25).with_latency(1200);
        let value = serde_json::to_value(&p).unwrap();

        assert_eq!(value["prediction"], "cat");
        assert_eq!(value["confidence"], 0.75);
        assert_eq!(value.as_object().unwrap().len(), 2);
    }
}
