//! PetLens Core
//!
//! Core types and utilities shared across PetLens components.
//!
//! This crate provides:
//! - Error types and result handling
//! - Wire types for predictions and model descriptions

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{InputSize, ModelInfo, Prediction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{InputSize, ModelInfo, Prediction};
}
