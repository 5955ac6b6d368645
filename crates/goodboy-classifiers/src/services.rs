//! Classifier services: a loader, a fixed model and a preprocessing step

use crate::cache::ModelStatus;
use crate::classifier::{argmax, ClassificationMetadata, ClassificationResult, ImageClassifier};
use crate::config::ModelSpec;
use crate::loader::ModelLoader;
use crate::model::ImageModel;
use crate::preprocessing::preprocess;
use async_trait::async_trait;
use goodboy_core::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Default labels of the general classifier, in model output order
pub const DEFAULT_GENERAL_LABELS: [&str; 5] = ["dog", "cat", "car", "tree", "person"];

/// Binary decision threshold on the positive class probability
pub const BINARY_THRESHOLD: f32 = 0.5;

/// A model handle bound to a service.
///
/// The handle is requested once at construction. If that fails, `model()`
/// asks the loader again before reporting `ModelNotLoaded`.
struct ModelBinding {
    service: String,
    loader: Arc<dyn ModelLoader>,
    spec: ModelSpec,
    handle: RwLock<Option<Arc<ImageModel>>>,
}

impl ModelBinding {
    async fn bind(service: &str, loader: Arc<dyn ModelLoader>, spec: ModelSpec) -> Self {
        let handle = match loader.load(&spec.name, &spec.version).await {
            Ok(model) => Some(model),
            Err(e) => {
                warn!("{} classifier started without model '{}': {}", service, spec.name, e);
                None
            }
        };

        Self {
            service: service.to_string(),
            loader,
            spec,
            handle: RwLock::new(handle),
        }
    }

    async fn model(&self) -> Result<Arc<ImageModel>> {
        let cached = self.handle.read().clone();
        if let Some(model) = cached {
            return Ok(model);
        }

        match self.loader.load(&self.spec.name, &self.spec.version).await {
            Ok(model) => {
                *self.handle.write() = Some(Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                debug!("{} model '{}' still unavailable: {}", self.service, self.spec.name, e);
                Err(Error::model_not_loaded(format!(
                    "{} classifier model not loaded",
                    self.service
                )))
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.handle.read().is_some()
    }

    fn status(&self) -> ModelStatus {
        if self.is_ready() {
            ModelStatus::Ready
        } else {
            self.loader.status(&self.spec.name)
        }
    }

    /// Preprocess the image for `model` and run inference
    fn run(&self, model: &ImageModel, image: &[u8]) -> Result<Vec<f32>> {
        let input = preprocess(
            image,
            model.input_size(),
            self.spec.normalization,
            model.device(),
        )?;
        model.probabilities(&input)
    }

    fn metadata(&self, model: &ImageModel) -> ClassificationMetadata {
        ClassificationMetadata {
            model: Some(model.metadata().name.clone()),
            version: Some(model.version().to_string()),
            all_scores: None,
        }
    }
}

/// Multi-class image classifier
pub struct GeneralClassifier {
    binding: ModelBinding,
    labels: Vec<String>,
}

impl GeneralClassifier {
    /// Create the service and load its model
    pub async fn new(loader: Arc<dyn ModelLoader>, spec: ModelSpec, labels: Vec<String>) -> Self {
        Self {
            binding: ModelBinding::bind("general", loader, spec).await,
            labels,
        }
    }

    /// Create the service with the default label set
    pub async fn with_default_labels(loader: Arc<dyn ModelLoader>, spec: ModelSpec) -> Self {
        let labels = DEFAULT_GENERAL_LABELS.iter().map(|l| l.to_string()).collect();
        Self::new(loader, spec, labels).await
    }

    /// Class probabilities in label order; they sum to 1
    pub async fn predict(&self, image: &[u8]) -> Result<Vec<(String, f32)>> {
        let model = self.binding.model().await?;
        self.predict_with(&model, image)
    }

    fn predict_with(&self, model: &ImageModel, image: &[u8]) -> Result<Vec<(String, f32)>> {
        let probs = self.binding.run(model, image)?;

        if probs.len() != self.labels.len() {
            return Err(Error::inference(format!(
                "model '{}' produces {} classes but {} labels are configured",
                model.metadata().name,
                probs.len(),
                self.labels.len()
            )));
        }

        Ok(self.labels.iter().cloned().zip(probs).collect())
    }

    /// Configured labels
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Load state of the bound model
    pub fn status(&self) -> ModelStatus {
        self.binding.status()
    }
}

#[async_trait]
impl ImageClassifier for GeneralClassifier {
    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult> {
        let start = Instant::now();
        let model = self.binding.model().await?;
        let scores = self.predict_with(&model, image)?;

        let values: Vec<f32> = scores.iter().map(|(_, p)| *p).collect();
        let (top, score) = argmax(&values)
            .ok_or_else(|| Error::inference("model produced no scores"))?;

        let mut metadata = self.binding.metadata(&model);
        let label = scores[top].0.clone();
        metadata.all_scores = Some(scores);

        Ok(ClassificationResult {
            label,
            score,
            metadata,
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn name(&self) -> &str {
        &self.binding.service
    }

    fn is_ready(&self) -> bool {
        self.binding.is_ready()
    }
}

/// Two-way classifier ("dog" / "not_dog", "apolo" / "not_apolo")
pub struct BinaryClassifier {
    binding: ModelBinding,
    positive: String,
    negative: String,
}

impl BinaryClassifier {
    /// Create a binary service and load its model
    pub async fn new(
        service: &str,
        loader: Arc<dyn ModelLoader>,
        spec: ModelSpec,
        positive: impl Into<String>,
        negative: impl Into<String>,
    ) -> Self {
        Self {
            binding: ModelBinding::bind(service, loader, spec).await,
            positive: positive.into(),
            negative: negative.into(),
        }
    }

    /// Dog detector
    pub async fn dog(loader: Arc<dyn ModelLoader>, spec: ModelSpec) -> Self {
        Self::new("dog", loader, spec, "dog", "not_dog").await
    }

    /// Detector for Apolo, one particular dog
    pub async fn apolo(loader: Arc<dyn ModelLoader>, spec: ModelSpec) -> Self {
        Self::new("apolo", loader, spec, "apolo", "not_apolo").await
    }

    /// Predicted label and positive-class probability
    pub async fn predict(&self, image: &[u8]) -> Result<(String, f32)> {
        let model = self.binding.model().await?;
        self.predict_with(&model, image)
    }

    fn predict_with(&self, model: &ImageModel, image: &[u8]) -> Result<(String, f32)> {
        let probs = self.binding.run(model, image)?;

        // a two-output head is ordered [negative, positive]
        let confidence = match probs.as_slice() {
            [p] => *p,
            [_, p] => *p,
            other => {
                return Err(Error::inference(format!(
                    "model '{}' is not binary: {} outputs",
                    model.metadata().name,
                    other.len()
                )))
            }
        };

        let label = if confidence > BINARY_THRESHOLD {
            &self.positive
        } else {
            &self.negative
        };

        Ok((label.clone(), confidence))
    }

    /// Positive and negative labels
    pub fn labels(&self) -> (&str, &str) {
        (&self.positive, &self.negative)
    }

    /// Load state of the bound model
    pub fn status(&self) -> ModelStatus {
        self.binding.status()
    }
}

#[async_trait]
impl ImageClassifier for BinaryClassifier {
    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult> {
        let start = Instant::now();
        let model = self.binding.model().await?;
        let (label, score) = self.predict_with(&model, image)?;

        Ok(ClassificationResult {
            label,
            score,
            metadata: self.binding.metadata(&model),
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn name(&self) -> &str {
        &self.binding.service
    }

    fn is_ready(&self) -> bool {
        self.binding.is_ready()
    }
}
