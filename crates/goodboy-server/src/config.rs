//! Server settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! settings file, then environment variables (`MODEL_SOURCE`, `MODELS_DIR`,
//! `S3_BUCKET_NAME`, ...). List values (`CORS_ORIGINS`, `GENERAL_LABELS`)
//! are comma separated.

use config::{Config, ConfigError, Environment, File};
use goodboy_classifiers::config::default_cache_dir;
use goodboy_classifiers::services::DEFAULT_GENERAL_LABELS;
use goodboy_classifiers::{LoaderConfig, ModelSpec, Normalization, RemoteStoreConfig};
use goodboy_core::ModelVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings of the classification service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Model backend: `local` or `s3`
    #[serde(default = "default_model_source")]
    pub model_source: String,

    /// Directory of the local backend
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Bucket of the remote backend
    #[serde(default = "default_bucket")]
    pub s3_bucket_name: String,

    #[serde(default = "default_region")]
    pub aws_region: String,

    /// Endpoint override for S3-compatible storage
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// Disk cache for remote artifacts
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: Option<PathBuf>,

    #[serde(default = "default_general_model")]
    pub general_model: String,

    #[serde(default = "default_dog_model")]
    pub dog_model: String,

    #[serde(default = "default_apolo_model")]
    pub apolo_model: String,

    /// Version pinned for every model; latest when unset
    #[serde(default)]
    pub model_version: Option<String>,

    /// Output labels of the general model, in output order
    #[serde(default = "default_general_labels")]
    pub general_labels: Vec<String>,

    /// Pixel normalization the models were trained with
    #[serde(default)]
    pub normalization: Normalization,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Fallback log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,

    /// Maximum accepted request body size
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Settings {
    /// Load settings from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, None)
    }

    /// Load settings from an optional file and explicit environment
    /// variables; `None` reads the process environment
    pub fn from_sources(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(
                Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins")
                    .with_list_parse_key("general_labels")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    /// Loader settings derived from these settings
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            model_source: self.model_source.clone(),
            models_dir: self.models_dir.clone(),
            remote: RemoteStoreConfig {
                bucket: self.s3_bucket_name.clone(),
                region: self.aws_region.clone(),
                endpoint: self.s3_endpoint.clone(),
                cache_dir: self.model_cache_dir.clone(),
                ..Default::default()
            },
        }
    }

    /// Model binding for a service
    pub fn model_spec(&self, name: &str) -> ModelSpec {
        let version = self
            .model_version
            .as_deref()
            .map(ModelVersion::parse)
            .unwrap_or_default();

        ModelSpec::new(name)
            .with_version(version)
            .with_normalization(self.normalization)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_source: default_model_source(),
            models_dir: default_models_dir(),
            s3_bucket_name: default_bucket(),
            aws_region: default_region(),
            s3_endpoint: None,
            model_cache_dir: default_model_cache_dir(),
            general_model: default_general_model(),
            dog_model: default_dog_model(),
            apolo_model: default_apolo_model(),
            model_version: None,
            general_labels: default_general_labels(),
            normalization: Normalization::default(),
            cors_origins: default_cors_origins(),
            log_level: default_log_level(),
            json_logs: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_model_source() -> String {
    "local".to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_bucket() -> String {
    RemoteStoreConfig::default().bucket
}

fn default_region() -> String {
    RemoteStoreConfig::default().region
}

fn default_model_cache_dir() -> Option<PathBuf> {
    Some(default_cache_dir())
}

fn default_general_model() -> String {
    "cat-dog-other-classifier".to_string()
}

fn default_dog_model() -> String {
    "dog-classifier".to_string()
}

fn default_apolo_model() -> String {
    "apolo-classifier".to_string()
}

fn default_general_labels() -> Vec<String> {
    DEFAULT_GENERAL_LABELS.iter().map(|l| l.to_string()).collect()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "https://localhost:3000".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
