//! Who's My Good Boy API
//!
//! HTTP surface of the classification service: multipart image uploads in,
//! JSON predictions out.
//!
//! - `POST /api/v1/classify`: general multi-class prediction
//! - `POST /api/v1/is-dog`: dog / not_dog
//! - `POST /api/v1/is-apolo`: apolo / not_apolo
//! - `GET /health`, `GET /metrics`

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Settings;
pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
