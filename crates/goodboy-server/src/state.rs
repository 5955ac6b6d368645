//! Application state shared across requests

use anyhow::Result;
use goodboy_classifiers::{BinaryClassifier, GeneralClassifier, LoaderManager, ModelLoader};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use crate::config::Settings;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded settings
    pub settings: Arc<Settings>,

    /// Owner of the model loader
    pub manager: Arc<LoaderManager>,

    /// Multi-class classifier behind `/classify`
    pub general: Arc<GeneralClassifier>,

    /// Dog detector behind `/is-dog`
    pub dog: Arc<BinaryClassifier>,

    /// Apolo detector behind `/is-apolo`
    pub apolo: Arc<BinaryClassifier>,

    /// Prometheus handle for `/metrics`; `None` renders an empty page
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Select the loader and bind the classifier services.
    ///
    /// Fails when the loader cannot be built (unsupported backend, missing
    /// models directory). A model that fails to load only leaves its
    /// service unready.
    pub async fn new(settings: Settings, metrics_handle: Option<PrometheusHandle>) -> Result<Self> {
        info!("Initializing application state");

        let manager = LoaderManager::new(settings.loader_config());
        let loader = manager.get_loader().await?;
        info!("Using {} model loader", loader.backend());

        let general = GeneralClassifier::new(
            Arc::clone(&loader),
            settings.model_spec(&settings.general_model),
            settings.general_labels.clone(),
        )
        .await;
        let dog = BinaryClassifier::dog(Arc::clone(&loader), settings.model_spec(&settings.dog_model)).await;
        let apolo = BinaryClassifier::apolo(loader, settings.model_spec(&settings.apolo_model)).await;

        Ok(Self {
            settings: Arc::new(settings),
            manager: Arc::new(manager),
            general: Arc::new(general),
            dog: Arc::new(dog),
            apolo: Arc::new(apolo),
            metrics_handle,
        })
    }

    /// Whether the shared loader holds only successfully loaded models
    pub async fn models_available(&self) -> bool {
        match self.manager.get_loader().await {
            Ok(loader) => loader.is_available(),
            Err(_) => false,
        }
    }
}
