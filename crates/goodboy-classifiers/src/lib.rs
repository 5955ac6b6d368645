//! Who's My Good Boy Classifiers
//!
//! Model loading and image classification for the classification service.
//!
//! - [`loader`]: resolve a model name (and version) to a cached handle, from
//!   a local directory or remote object storage
//! - [`manager`]: pick the configured loader once and keep it
//! - [`services`]: general, dog and Apolo classifiers over a loader
//!
//! Inference is a single Candle forward pass on CPU.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod loader;
pub mod manager;
pub mod model;
pub mod preprocessing;
pub mod services;
pub mod store;

pub use cache::{CachedModel, ModelCache, ModelStatus};
pub use classifier::{ClassificationMetadata, ClassificationResult, ImageClassifier};
pub use config::{BackendKind, LoaderConfig, ModelSpec, RemoteStoreConfig};
pub use loader::{LocalModelLoader, ModelLoader, RemoteModelLoader};
pub use manager::LoaderManager;
pub use model::{ImageModel, ModelMetadata};
pub use preprocessing::Normalization;
pub use services::{BinaryClassifier, GeneralClassifier};
pub use store::{FsObjectStore, HttpObjectStore, ObjectStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, ImageClassifier};
    pub use crate::config::{LoaderConfig, ModelSpec};
    pub use crate::loader::ModelLoader;
    pub use crate::manager::LoaderManager;
    pub use crate::services::{BinaryClassifier, GeneralClassifier};
    pub use goodboy_core::{Error, ModelId, ModelVersion, Result};
}
