//! Shared fixtures for the integration tests
//!
//! Model fixtures are linear heads with zero weights, so the output depends
//! only on the bias and any decodable image gives the same prediction.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use candle_core::{DType, Device, Tensor};
use goodboy_classifiers::model::{BIAS_TENSOR, WEIGHT_TENSOR};
use goodboy_classifiers::store::{artifact_key, ObjectStore};
use goodboy_core::{Error, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

pub const BUCKET: &str = "models";

/// Input side used by every fixture model
pub const SIDE: usize = 8;

/// Write a zero-weight linear head with the given bias
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

/// SafeTensors bytes of a zero-weight linear head
pub fn model_bytes(bias: &[f32]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.safetensors");
    write_model(&path, bias);
    std::fs::read(path).unwrap()
}

fn encode(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(100, 100, |x, y| Rgb([x as u8, y as u8, 200]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A small JPEG image
pub fn jpeg_bytes() -> Vec<u8> {
    encode(ImageFormat::Jpeg)
}

/// A small PNG image
pub fn png_bytes() -> Vec<u8> {
    encode(ImageFormat::Png)
}

/// In-memory object store that counts calls
#[derive(Default)]
pub struct MockObjectStore {
    objects: HashMap<String, Bytes>,
    versions: HashMap<String, Vec<String>>,
    get_calls: AtomicU32,
    list_calls: AtomicU32,
}

impl MockObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a model version
    pub fn with_model(mut self, name: &str, version: &str, bytes: Vec<u8>) -> Self {
        self.objects
            .insert(artifact_key(name, version), Bytes::from(bytes));
        self.versions
            .entry(name.to_string())
            .or_default()
            .push(version.to_string());
        self
    }

    /// Number of `get_object` calls
    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Number of `list_versions` calls
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);

        if bucket != BUCKET {
            return Err(Error::not_found(format!("bucket {}", bucket)));
        }

        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("s3://{}/{}", bucket, key)))
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.versions.get(name).cloned().unwrap_or_default())
    }

    fn describe(&self) -> String {
        format!("mock://{}", BUCKET)
    }
}
