//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use goodboy_classifiers::{ImageClassifier, ModelStatus};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::debug;

use crate::error::AppError;
use crate::middleware::{cors_layer, log_requests};
use crate::state::AppState;

/// Multipart field holding the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// Accepted upload content types
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

pub fn create_router(state: AppState) -> Router {
    let max_upload = state.settings.max_upload_bytes;
    let cors = cors_layer(&state.settings.cors_origins);

    let api_routes = Router::new()
        .route("/classify", post(classify_image))
        .route("/is-dog", post(is_dog))
        .route("/is-apolo", post(is_apolo));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

/// One class of a multi-class prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub probability: f32,
}

/// Response of `/classify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedClassificationResponse {
    pub predictions: Vec<Prediction>,
    pub top_prediction: String,
    /// Seconds spent handling the request
    pub processing_time: f64,
}

/// Response of the binary endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub prediction: String,
    /// Probability of the positive class
    pub confidence: f32,
    pub processing_time: f64,
}

/// Load state reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelHealth {
    Ready,
    NotLoaded,
}

impl From<ModelStatus> for ModelHealth {
    fn from(status: ModelStatus) -> Self {
        match status {
            ModelStatus::Ready => ModelHealth::Ready,
            ModelStatus::NotLoaded | ModelStatus::Failed(_) => ModelHealth::NotLoaded,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsHealth {
    pub general: ModelHealth,
    pub dog: ModelHealth,
    pub apolo: ModelHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when every model is loaded, `degraded` otherwise
    pub status: String,
    pub models: ModelsHealth,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let models = ModelsHealth {
        general: state.general.status().into(),
        dog: state.dog.status().into(),
        apolo: state.apolo.status().into(),
    };

    let all_ready = [models.general, models.dog, models.apolo]
        .iter()
        .all(|m| *m == ModelHealth::Ready);
    let status = if all_ready && state.models_available().await {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        models,
    })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

/// Extract the `image` field, accepting only JPEG and PNG uploads
async fn read_image(mut multipart: Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            debug!("Rejecting upload with content type '{}'", content_type);
            return Err(AppError::InvalidImage);
        }

        return Ok(field.bytes().await?);
    }

    debug!("Upload has no '{}' field", IMAGE_FIELD);
    Err(AppError::InvalidImage)
}

/// Record the outcome and latency of a prediction
fn observe<T>(
    classifier: &'static str,
    start: Instant,
    result: goodboy_core::Result<T>,
) -> Result<T, AppError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(goodboy_core::Error::InvalidImage(_)) => "invalid_image",
        Err(goodboy_core::Error::ModelNotLoaded(_)) => "model_not_loaded",
        Err(_) => "error",
    };

    metrics::counter!("goodboy_predictions_total", "classifier" => classifier, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("goodboy_prediction_latency_seconds", "classifier" => classifier)
        .record(start.elapsed().as_secs_f64());

    result.map_err(AppError::from)
}

/// Classify an image with the general model
async fn classify_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DetailedClassificationResponse>, AppError> {
    let start = Instant::now();
    let image = read_image(multipart).await?;

    let result = observe("general", start, state.general.classify(&image).await)?;
    let predictions = result
        .metadata
        .all_scores
        .unwrap_or_default()
        .into_iter()
        .map(|(class, probability)| Prediction { class, probability })
        .collect();

    Ok(Json(DetailedClassificationResponse {
        predictions,
        top_prediction: result.label,
        processing_time: start.elapsed().as_secs_f64(),
    }))
}

/// Determine if the image contains a dog
async fn is_dog(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ClassificationResponse>, AppError> {
    let start = Instant::now();
    let image = read_image(multipart).await?;

    let (prediction, confidence) = observe("dog", start, state.dog.predict(&image).await)?;

    Ok(Json(ClassificationResponse {
        prediction,
        confidence,
        processing_time: start.elapsed().as_secs_f64(),
    }))
}

/// Determine if the image is of Apolo
async fn is_apolo(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ClassificationResponse>, AppError> {
    let start = Instant::now();
    let image = read_image(multipart).await?;

    let (prediction, confidence) = observe("apolo", start, state.apolo.predict(&image).await)?;

    Ok(Json(ClassificationResponse {
        prediction,
        confidence,
        processing_time: start.elapsed().as_secs_f64(),
    }))
}

async fn fallback() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "detail": "Not Found" })),
    )
}
