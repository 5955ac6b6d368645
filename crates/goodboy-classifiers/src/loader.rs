//! Model loaders: resolve a model name to a cached handle from a backing store

use crate::cache::{ModelCache, ModelStatus};
use crate::config::{BackendKind, RemoteStoreConfig};
use crate::model::{ImageModel, MODEL_EXTENSION};
use crate::store::{artifact_key, FsObjectStore, HttpObjectStore, ObjectStore};
use async_trait::async_trait;
use goodboy_core::types::highest_version;
use goodboy_core::{Error, ModelId, ModelVersion, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Version recorded for models read from a local directory
pub const LOCAL_VERSION: &str = "local";

/// Resolves model names to loaded handles.
///
/// Implementations cache every successful load for the life of the loader;
/// a second `load` of the same name is served from memory.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load (or fetch from cache) a model
    async fn load(&self, name: &ModelId, version: &ModelVersion) -> Result<Arc<ImageModel>>;

    /// True when at least one model is cached and no cached load has failed
    fn is_available(&self) -> bool;

    /// Load state of a single model
    fn status(&self, name: &ModelId) -> ModelStatus;

    /// Storage backend this loader reads from
    fn backend(&self) -> BackendKind;
}

/// Record the outcome of a load in the cache, logs and metrics
fn record_load(
    cache: &ModelCache,
    backend: BackendKind,
    name: &ModelId,
    result: Result<ImageModel>,
) -> Result<Arc<ImageModel>> {
    match result {
        Ok(model) => {
            let model = Arc::new(model);
            info!(
                "Loaded model '{}' version {} ({} classes, {}px input) from {} storage",
                name,
                model.version(),
                model.num_classes(),
                model.input_size(),
                backend
            );
            metrics::counter!("goodboy_model_loads_total", "backend" => backend.as_str(), "outcome" => "ok")
                .increment(1);
            cache.insert(name.as_str(), Arc::clone(&model));
            Ok(model)
        }
        Err(e) => {
            warn!("Failed to load model '{}' from {} storage: {}", name, backend, e);
            metrics::counter!("goodboy_model_loads_total", "backend" => backend.as_str(), "outcome" => "error")
                .increment(1);
            cache.mark_failed(name.as_str(), e.to_string());
            Err(e)
        }
    }
}

/// Loads models from a directory on the local filesystem
#[derive(Debug)]
pub struct LocalModelLoader {
    models_dir: PathBuf,
    cache: ModelCache,
}

impl LocalModelLoader {
    /// Create a loader rooted at `models_dir`, which must already exist
    pub fn new(models_dir: impl Into<PathBuf>) -> Result<Self> {
        let models_dir = models_dir.into();
        if !models_dir.is_dir() {
            return Err(Error::config(format!(
                "Models directory '{}' does not exist",
                models_dir.display()
            )));
        }

        info!(
            "Instantiating local model loader with models directory '{}'",
            models_dir.display()
        );

        Ok(Self {
            models_dir,
            cache: ModelCache::new(),
        })
    }

    /// Base directory models are resolved against
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Access the in-memory cache
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Resolve a model name to a file under the models directory.
    ///
    /// `name` is tried as given, then with the artifact extension appended.
    pub fn resolve_path(&self, name: &ModelId) -> Result<PathBuf> {
        let raw = name.as_str();
        if raw.is_empty() || raw.contains(['/', '\\']) || raw == ".." || raw == "." {
            return Err(Error::not_found(format!("Invalid model name '{}'", raw)));
        }

        let path = self.models_dir.join(raw);
        if path.is_file() {
            return Ok(path);
        }

        if path.extension().is_none() {
            let with_ext = path.with_extension(MODEL_EXTENSION);
            if with_ext.is_file() {
                return Ok(with_ext);
            }
        }

        Err(Error::not_found(format!("No model file '{}'", path.display())))
    }

    async fn read_model(&self, name: &ModelId) -> Result<ImageModel> {
        let path = self.resolve_path(name)?;
        debug!("Reading model '{}' from {}", name, path.display());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!("No model file '{}'", path.display())));
            }
            Err(e) => return Err(e.into()),
        };

        ImageModel::from_bytes(name, LOCAL_VERSION, &bytes)
    }
}

#[async_trait]
impl ModelLoader for LocalModelLoader {
    async fn load(&self, name: &ModelId, _version: &ModelVersion) -> Result<Arc<ImageModel>> {
        if let Some(model) = self.cache.get(name.as_str()) {
            debug!("Model '{}' served from cache", name);
            return Ok(model);
        }

        info!("Loading model '{}' from {}", name, self.models_dir.display());
        let result = self.read_model(name).await;
        record_load(&self.cache, BackendKind::Local, name, result)
    }

    fn is_available(&self) -> bool {
        self.cache.is_available()
    }

    fn status(&self, name: &ModelId) -> ModelStatus {
        self.cache.status(name.as_str())
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }
}

/// Loads models from remote object storage, optionally persisting artifacts
/// under `{cache_dir}/{name}/{version}/model.safetensors`.
///
/// The store client is created on first use.
pub struct RemoteModelLoader {
    config: RemoteStoreConfig,
    store: OnceCell<Arc<dyn ObjectStore>>,
    cache: ModelCache,
}

impl RemoteModelLoader {
    /// Create a loader whose HTTP store is built lazily from `config`
    pub fn new(config: RemoteStoreConfig) -> Self {
        info!(
            "Instantiating remote model loader for bucket '{}' ({})",
            config.bucket,
            config.endpoint_url()
        );

        Self {
            config,
            store: OnceCell::new(),
            cache: ModelCache::new(),
        }
    }

    /// Create a loader over an existing store
    pub fn with_store(config: RemoteStoreConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store: OnceCell::new_with(Some(store)),
            cache: ModelCache::new(),
        }
    }

    /// Whether the store client has been created yet
    pub fn is_connected(&self) -> bool {
        self.store.initialized()
    }

    /// Access the in-memory cache
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Disk cache location of an artifact, if the disk cache is enabled
    pub fn cache_path(&self, name: &ModelId, version: &str) -> Option<PathBuf> {
        self.config.cache_dir.as_ref().map(|dir| {
            dir.join(name.as_str())
                .join(version)
                .join(format!("model.{}", MODEL_EXTENSION))
        })
    }

    async fn store(&self) -> Result<&Arc<dyn ObjectStore>> {
        self.store
            .get_or_try_init(|| async {
                let store: Arc<dyn ObjectStore> = match self.config.mirror_root() {
                    Some(root) => Arc::new(FsObjectStore::new(root, &self.config.bucket)),
                    None => Arc::new(HttpObjectStore::from_config(&self.config)?),
                };
                info!("Connected to remote model storage at {}", store.describe());
                Ok::<_, Error>(store)
            })
            .await
    }

    /// Resolve `latest` to the highest published version, or check that a
    /// pinned version exists
    pub async fn resolve_version(&self, name: &ModelId, version: &ModelVersion) -> Result<String> {
        let store = self.store().await?;
        let versions = store.list_versions(name.as_str()).await?;

        if versions.is_empty() {
            return Err(Error::not_found(format!(
                "Model '{}' not found in remote storage",
                name
            )));
        }

        match version {
            ModelVersion::Latest => highest_version(versions.iter().map(String::as_str))
                .map(str::to_string)
                .ok_or_else(|| Error::not_found(format!("Model '{}' has no versions", name))),
            ModelVersion::Tagged(tag) if versions.iter().any(|v| v == tag) => Ok(tag.clone()),
            ModelVersion::Tagged(tag) => Err(Error::not_found(format!(
                "Model '{}' version '{}' not found in remote storage",
                name, tag
            ))),
        }
    }

    /// Read and deserialize a disk-cached artifact. Unreadable or corrupt
    /// entries are discarded so the next step downloads a fresh copy.
    async fn read_cached(&self, name: &ModelId, version: &str, path: &Path) -> Option<ImageModel> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read disk cache {}: {}", path.display(), e);
                return None;
            }
        };

        match ImageModel::from_bytes(name, version, &bytes) {
            Ok(model) => {
                debug!("Read '{}' {} from disk cache {}", name, version, path.display());
                Some(model)
            }
            Err(e) => {
                warn!(
                    "Discarding corrupt disk cache entry {}: {}",
                    path.display(),
                    e
                );
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
                None
            }
        }
    }

    async fn fetch_model(&self, name: &ModelId, version: &ModelVersion) -> Result<ImageModel> {
        let resolved = self.resolve_version(name, version).await?;
        let cache_path = self.cache_path(name, &resolved);

        if let Some(path) = &cache_path {
            if let Some(model) = self.read_cached(name, &resolved, path).await {
                return Ok(model);
            }
        }

        let store = self.store().await?;
        let key = artifact_key(name.as_str(), &resolved);
        info!("Fetching model artifact '{}'", key);
        let bytes = store.get_object(&self.config.bucket, &key).await?;
        let model = ImageModel::from_bytes(name, &resolved, &bytes)?;

        // the disk cache is best effort; the downloaded model is served either way
        if let Some(path) = &cache_path {
            match persist(path, &bytes).await {
                Ok(()) => debug!("Persisted '{}' {} to {}", name, resolved, path.display()),
                Err(e) => warn!("Failed to persist {} to disk cache: {}", key, e),
            }
        }

        Ok(model)
    }
}

/// Write `bytes` to a sibling temp file and rename it over `path`, so readers
/// never observe a partially written artifact.
async fn persist(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    static SEQ: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp = PathBuf::from(tmp);

    if let Err(e) = write_and_rename(&tmp, path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(tmp, bytes).await?;
    tokio::fs::rename(tmp, path).await
}

#[async_trait]
impl ModelLoader for RemoteModelLoader {
    async fn load(&self, name: &ModelId, version: &ModelVersion) -> Result<Arc<ImageModel>> {
        if let Some(model) = self.cache.get(name.as_str()) {
            // one slot per name: a pinned version different from the cached
            // one replaces it
            match version.tag() {
                Some(tag) if tag != model.version() => {
                    info!(
                        "Model '{}' cached at {}, reloading requested version {}",
                        name,
                        model.version(),
                        tag
                    );
                }
                _ => {
                    debug!("Model '{}' served from cache", name);
                    return Ok(model);
                }
            }
        }

        info!("Loading model '{}' ({}) from remote storage", name, version);
        let result = self.fetch_model(name, version).await;
        record_load(&self.cache, BackendKind::Remote, name, result)
    }

    fn is_available(&self) -> bool {
        self.cache.is_available()
    }

    fn status(&self, name: &ModelId) -> ModelStatus {
        self.cache.status(name.as_str())
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }
}
