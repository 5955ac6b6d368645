//! Error types for the classification service

/// Result type alias using the service's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for model loading and classification
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested model (or model version) does not exist in the backing store
    #[error("model not found: {0}")]
    NotFound(String),

    /// The artifact exists but could not be deserialized as a model
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend kind other than local or remote storage
    #[error("unsupported model backend: {0}")]
    UnsupportedBackend(String),

    /// A classifier was asked to predict without a loaded model
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    /// Uploaded bytes could not be interpreted as an image
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Forward pass or tensor manipulation failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Remote object storage failures (transport, unexpected status)
    #[error("storage error: {0}")]
    Storage(String),

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
    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new invalid-model error
    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new unsupported-backend error
    pub fn unsupported_backend(kind: impl Into<String>) -> Self {
        Self::UnsupportedBackend(kind.into())
    }

    /// Create a new model-not-loaded error
    pub fn model_not_loaded(msg: impl Into<String>) -> Self {
        Self::ModelNotLoaded(msg.into())
    }

    /// Create a new invalid-image error
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
