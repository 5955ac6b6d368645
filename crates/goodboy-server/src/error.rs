//! Mapping of service errors to HTTP responses

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Errors returned by the HTTP handlers.
///
/// Bodies are `{"detail": message}`. Internal failures are logged and
/// answered with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid image. Please check the file format and try again.")]
    InvalidImage,

    #[error("Model not loaded. Please try again later.")]
    ModelNotLoaded,

    #[error("{}", .0.body_text())]
    Upload(#[from] MultipartError),

    #[error("An unexpected error occurred. Please try again later.")]
    Internal,
}

impl AppError {
    /// HTTP status of the error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidImage => StatusCode::BAD_REQUEST,
            AppError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upload(e) => e.status(),
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<goodboy_core::Error> for AppError {
    fn from(err: goodboy_core::Error) -> Self {
        match err {
            goodboy_core::Error::InvalidImage(_) => AppError::InvalidImage,
            goodboy_core::Error::ModelNotLoaded(_) => AppError::ModelNotLoaded,
            other => {
                error!("Prediction failed: {}", other);
                AppError::Internal
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "detail": self.to_string() });

        (status, Json(body)).into_response()
    }
}
