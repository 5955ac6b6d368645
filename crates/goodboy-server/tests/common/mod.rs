//! Router fixtures for the API tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use candle_core::{DType, Device, Tensor};
use goodboy_classifiers::model::{BIAS_TENSOR, WEIGHT_TENSOR};
use goodboy_server::{create_router, AppState, Settings};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

const SIDE: usize = 8;
const BOUNDARY: &str = "goodboy-test-boundary";

/// Write a zero-weight linear head whose output depends only on `bias`
pub fn write_model(path: impl AsRef<Path>, bias: &[f32]) {
    let classes = bias.len();
    let tensors = HashMap::from([
        (
            WEIGHT_TENSOR.to_string(),
            Tensor::zeros((classes, 3 * SIDE * SIDE), DType::F32, &Device::Cpu).unwrap(),
        ),
        (
            BIAS_TENSOR.to_string(),
            Tensor::from_slice(bias, classes, &Device::Cpu).unwrap(),
        ),
    ]);
    candle_core::safetensors::save(&tensors, path.as_ref()).unwrap();
}

/// Models directory with all three default models
pub fn models_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_model(
        dir.path().join("cat-dog-other-classifier.safetensors"),
        &[0.0, 2.0, 0.0, 0.0, 0.0],
    );
    write_model(dir.path().join("dog-classifier.safetensors"), &[2.0]);
    write_model(dir.path().join("apolo-classifier.safetensors"), &[1.0, -1.0]);
    dir
}

/// Settings for a local models directory
pub fn settings(dir: &Path) -> Settings {
    Settings {
        models_dir: dir.to_path_buf(),
        model_cache_dir: None,
        ..Default::default()
    }
}

pub async fn router(settings: Settings) -> Router {
    let state = AppState::new(settings, None).await.unwrap();
    create_router(state)
}

pub fn jpeg_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(100, 100, |_, _| Rgb([255, 255, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

/// Multipart upload of a single file field
pub fn upload(uri: &str, field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Send a request and decode the JSON body
pub async fn send(app: Router, request: Request<Body>) -> (Response<()>, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (Response::from_parts(parts, ()), json)
}
