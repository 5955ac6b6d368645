//! Loader selection: build the configured loader once and hand out the same
//! instance for the lifetime of the manager.

use crate::config::{BackendKind, LoaderConfig};
use crate::loader::{LocalModelLoader, ModelLoader, RemoteModelLoader};
use goodboy_core::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Owns the process's model loader.
///
/// The backend is chosen from the configuration captured at construction, on
/// the first `get_loader` call. Later calls return the same instance without
/// consulting the configuration again. A failed construction leaves the
/// manager uninitialized.
pub struct LoaderManager {
    config: LoaderConfig,
    loader: OnceCell<Arc<dyn ModelLoader>>,
}

impl LoaderManager {
    /// Create an uninitialized manager
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            loader: OnceCell::new(),
        }
    }

    /// Get the loader, constructing it on first use
    pub async fn get_loader(&self) -> Result<Arc<dyn ModelLoader>> {
        self.loader
            .get_or_try_init(|| async { self.build_loader() })
            .await
            .map(Arc::clone)
    }

    /// Whether a loader has been constructed
    pub fn is_initialized(&self) -> bool {
        self.loader.initialized()
    }

    fn build_loader(&self) -> Result<Arc<dyn ModelLoader>> {
        let backend = self.config.backend()?;
        info!("Selecting {} model loader", backend);

        let loader: Arc<dyn ModelLoader> = match backend {
            BackendKind::Local => Arc::new(LocalModelLoader::new(&self.config.models_dir)?),
            BackendKind::Remote => Arc::new(RemoteModelLoader::new(self.config.remote.clone())),
        };

        metrics::counter!("goodboy_loader_constructions_total", "backend" => backend.as_str())
            .increment(1);

        Ok(loader)
    }
}
