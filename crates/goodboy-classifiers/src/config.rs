//! Configuration for model loading and the classifier services

use crate::preprocessing::Normalization;
use goodboy_core::{Error, ModelId, ModelVersion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Which storage source a loader reads models from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Models directory on the local filesystem
    Local,
    /// Remote object storage (S3-compatible)
    Remote,
}

impl BackendKind {
    /// Canonical name of the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "s3",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" | "remote" => Ok(Self::Remote),
            _ => Err(Error::unsupported_backend(s)),
        }
    }
}

/// Configuration consumed by the loader manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Backend selector (`local`, `s3` or `remote`). Kept as text so an
    /// unsupported value surfaces when the loader is first requested.
    #[serde(default = "default_model_source")]
    pub model_source: String,

    /// Base directory for the local backend
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Remote object storage settings
    #[serde(default)]
    pub remote: RemoteStoreConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            model_source: default_model_source(),
            models_dir: default_models_dir(),
            remote: RemoteStoreConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Local backend rooted at `models_dir`
    pub fn local(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_source: BackendKind::Local.as_str().to_string(),
            models_dir: models_dir.into(),
            ..Default::default()
        }
    }

    /// Remote backend with the given store settings
    pub fn remote(remote: RemoteStoreConfig) -> Self {
        Self {
            model_source: BackendKind::Remote.as_str().to_string(),
            remote,
            ..Default::default()
        }
    }

    /// Parse the configured backend kind
    pub fn backend(&self) -> goodboy_core::Result<BackendKind> {
        self.model_source.parse()
    }
}

/// Remote object storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    /// Bucket holding `{name}/{version}/model.safetensors` artifacts
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Region used to derive the default endpoint
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override (S3-compatible gateways). A `file://` URL points
    /// at a local bucket mirror instead.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Directory where fetched artifacts are persisted; `None` disables
    /// the disk cache
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            cache_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteStoreConfig {
    /// Endpoint to issue requests against
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    /// Root directory of a local bucket mirror, when the endpoint is a
    /// `file://` URL
    pub fn mirror_root(&self) -> Option<PathBuf> {
        let url = Url::parse(self.endpoint.as_deref()?).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        url.to_file_path().ok()
    }

    /// Set the disk cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

/// Model bound to a classifier service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier in the backing store
    pub name: ModelId,

    /// Requested version
    #[serde(default)]
    pub version: ModelVersion,

    /// Pixel normalization the model was trained with
    #[serde(default)]
    pub normalization: Normalization,
}

impl ModelSpec {
    /// Latest version of `name` with unit normalization
    pub fn new(name: impl Into<ModelId>) -> Self {
        Self {
            name: name.into(),
            version: ModelVersion::Latest,
            normalization: Normalization::Unit,
        }
    }

    /// Pin a version
    pub fn with_version(mut self, version: ModelVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the normalization
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }
}

/// Default cache directory for remote artifacts
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("goodboy/models")
}

fn default_model_source() -> String {
    BackendKind::Local.as_str().to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_bucket() -> String {
    "whos-my-good-boy-models".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("local".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!("S3".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert_eq!("remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);

        let err = "production".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedBackend(kind) if kind == "production"));
    }

    #[test]
    fn test_default_endpoint_uses_region() {
        let config = RemoteStoreConfig {
            region: "eu-west-1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint_url(), "https://s3.eu-west-1.amazonaws.com");

        let config = RemoteStoreConfig {
            endpoint: Some("http://localhost:9000".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint_url(), "http://localhost:9000");
        assert_eq!(config.mirror_root(), None);
    }

    #[test]
    fn test_file_endpoint_is_mirror() {
        let config = RemoteStoreConfig {
            endpoint: Some("file:///srv/bucket-mirror".to_string()),
            ..Default::default()
        };
        assert_eq!(config.mirror_root(), Some(PathBuf::from("/srv/bucket-mirror")));

        assert_eq!(RemoteStoreConfig::default().mirror_root(), None);
    }

    #[test]
    fn test_model_spec_from_json() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{"name": "cat-dog-other-classifier", "version": "v1", "normalization": "imagenet"}"#,
        )
        .unwrap();

        assert_eq!(spec.name.as_str(), "cat-dog-other-classifier");
        assert_eq!(spec.version, ModelVersion::tagged("v1"));
        assert_eq!(spec.normalization, Normalization::Imagenet);

        let spec: ModelSpec = serde_json::from_str(r#"{"name": "dog"}"#).unwrap();
        assert!(spec.version.is_latest());
    }
}
