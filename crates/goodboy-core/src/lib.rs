//! Who's My Good Boy Core
//!
//! Core types and error handling shared across the classification service.
//!
//! This crate provides:
//! - The error taxonomy used by model loaders, classifiers and the HTTP layer
//! - Model identifiers (`ModelId`, `ModelVersion`)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ModelId, ModelVersion};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ModelId, ModelVersion};
}
