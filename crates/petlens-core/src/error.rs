//! Error types for PetLens

/// Result type alias using PetLens' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for PetLens operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors (bad values, missing model files)
    #[error("configuration error: {0}")]
    Config(String),

    /// Model construction and weight loading errors
    #[error("model error: {0}")]
    Model(String),

    /// Image decoding and preprocessing errors
    #[error("image error: {0}")]
    Image(String),

    /// Forward pass and output interpretation errors
    #[error("inference error: {0}")]
    Inference(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new image error
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-friendly name of the error kind, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Model(_) => "model",
            Self::Image(_) => "image",
            Self::Inference(_) => "inference",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_prefix() {
        let err = Error::image("unsupported format");
        assert_eq!(err.to_string(), "image error: unsupported format");
        assert_eq!(err.kind(), "image");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.kind(), "io");
    }
}
