//! Object storage collaborators for the remote model loader
//!
//! The loader only needs two operations from a store: fetch an object and
//! list the versions published for a model name. Artifacts live at
//! `{name}/{version}/model.safetensors` and each model publishes a
//! `{name}/versions.json` manifest (`{"versions": ["v1", "v2"]}`).

use crate::config::RemoteStoreConfig;
use crate::model::MODEL_EXTENSION;
use async_trait::async_trait;
use bytes::Bytes;
use goodboy_core::{Error, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// File name of the version manifest under a model prefix
pub const VERSIONS_MANIFEST: &str = "versions.json";

/// Object key of a model artifact
pub fn artifact_key(name: &str, version: &str) -> String {
    format!("{}/{}/model.{}", name, version, MODEL_EXTENSION)
}

/// Object key of a model's version manifest
pub fn manifest_key(name: &str) -> String {
    format!("{}/{}", name, VERSIONS_MANIFEST)
}

/// Versions published for a model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<String>,
}

/// Minimal object storage contract
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object. Missing keys yield `Error::NotFound`.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Versions published for `name`; empty when the name is unknown
    async fn list_versions(&self, name: &str) -> Result<Vec<String>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Store reached over plain HTTP GETs (`{endpoint}/{bucket}/{key}`).
///
/// Works against public buckets, pre-authorized gateways and S3-compatible
/// servers that allow anonymous reads. Request signing is not performed.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
}

impl HttpObjectStore {
    /// Create a store for `bucket` at `endpoint`
    pub fn new(endpoint: &str, bucket: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("Invalid storage endpoint '{}': {}", endpoint, e)))?;

        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(Error::config("Remote model storage requires a bucket name"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            bucket,
        })
    }

    /// Create a store from remote settings
    pub fn from_config(config: &RemoteStoreConfig) -> Result<Self> {
        Self::new(
            &config.endpoint_url(),
            config.bucket.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// URL of an object
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        self.endpoint
            .join(&format!("{}/{}", bucket, key))
            .map_err(|e| Error::storage(format!("Invalid object key '{}': {}", key, e)))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let url = self.object_url(bucket, key)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::storage(format!("Request to {} failed: {}", url, e)))?;

        match response.status() {
            // S3 answers 403 for missing keys when listing is not permitted
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                Err(Error::not_found(format!("s3://{}/{}", bucket, key)))
            }
            status if !status.is_success() => Err(Error::storage(format!(
                "Unexpected status {} for {}",
                status, url
            ))),
            _ => response
                .bytes()
                .await
                .map_err(|e| Error::storage(format!("Failed to read {}: {}", url, e))),
        }
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        match self.get_object(&self.bucket, &manifest_key(name)).await {
            Ok(body) => {
                let manifest: VersionManifest = serde_json::from_slice(&body)?;
                Ok(manifest.versions)
            }
            Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        format!("{}{}", self.endpoint, self.bucket)
    }
}

/// Store backed by a directory tree (`{root}/{bucket}/{key}`), e.g. a synced
/// bucket mirror. Versions are the subdirectories of `{root}/{bucket}/{name}`
/// that hold an artifact.
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(Error::not_found(format!("{}/{}", bucket, key)));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.root.join(&self.bucket).join(name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if has_artifact(&path).await {
                if let Some(version) = path.file_name().and_then(|s| s.to_str()) {
                    versions.push(version.to_string());
                }
            }
        }
        versions.sort();

        Ok(versions)
    }

    fn describe(&self) -> String {
        self.root.join(&self.bucket).display().to_string()
    }
}

async fn has_artifact(dir: &Path) -> bool {
    tokio::fs::metadata(dir.join(format!("model.{}", MODEL_EXTENSION)))
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
