//! Loaded model handles backed by Candle tensors
//!
//! A model artifact is a SafeTensors file holding a linear classification
//! head over a flattened `3 x S x S` image:
//!
//! - `head.weight`: `[num_classes, 3 * S * S]`
//! - `head.bias`: `[num_classes]`
//!
//! `S` is derived from the weight shape, so the preprocessing step always
//! matches what the model was trained on.

use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::Linear;
use goodboy_core::{Error, ModelId, Result};
use std::collections::HashMap;

/// Tensor name of the classification head weights
pub const WEIGHT_TENSOR: &str = "head.weight";

/// Tensor name of the classification head bias
pub const BIAS_TENSOR: &str = "head.bias";

/// File extension of model artifacts
pub const MODEL_EXTENSION: &str = "safetensors";

/// Metadata describing a loaded model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Model name/identifier
    pub name: String,

    /// Model version (`local` for directory-backed models)
    pub version: String,

    /// Side length of the square RGB input
    pub input_size: usize,

    /// Number of output classes
    pub num_classes: usize,
}

/// Loaded, ready-to-run image model
pub struct ImageModel {
    head: Linear,
    device: Device,
    metadata: ModelMetadata,
}

impl std::fmt::Debug for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageModel")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ImageModel {
    /// Deserialize a model from SafeTensors bytes
    pub fn from_bytes(name: &ModelId, version: &str, bytes: &[u8]) -> Result<Self> {
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load_buffer(bytes, &device).map_err(|e| {
            Error::invalid_model(format!("'{}' is not a SafeTensors artifact: {}", name, e))
        })?;

        Self::from_tensors(name, version, tensors, device)
    }

    /// Build a model from named tensors
    pub fn from_tensors(
        name: &ModelId,
        version: &str,
        mut tensors: HashMap<String, Tensor>,
        device: Device,
    ) -> Result<Self> {
        let weight = take_f32(&mut tensors, name, WEIGHT_TENSOR)?;
        let bias = take_f32(&mut tensors, name, BIAS_TENSOR)?;

        let (num_classes, in_features) = weight.dims2().map_err(|_| {
            Error::invalid_model(format!(
                "'{}': {} must be rank 2, got shape {:?}",
                name,
                WEIGHT_TENSOR,
                weight.dims()
            ))
        })?;

        let bias_len = bias.dims1().map_err(|_| {
            Error::invalid_model(format!(
                "'{}': {} must be rank 1, got shape {:?}",
                name,
                BIAS_TENSOR,
                bias.dims()
            ))
        })?;

        if num_classes == 0 {
            return Err(Error::invalid_model(format!("'{}' has no output classes", name)));
        }

        if bias_len != num_classes {
            return Err(Error::invalid_model(format!(
                "'{}': bias has {} entries but weight has {} rows",
                name, bias_len, num_classes
            )));
        }

        let input_size = square_side(in_features).ok_or_else(|| {
            Error::invalid_model(format!(
                "'{}': {} input features is not a 3-channel square image",
                name, in_features
            ))
        })?;

        Ok(Self {
            head: Linear::new(weight, Some(bias)),
            device,
            metadata: ModelMetadata {
                name: name.to_string(),
                version: version.to_string(),
                input_size,
                num_classes,
            },
        })
    }

    /// Run the forward pass and return class probabilities.
    ///
    /// Single-output heads use a sigmoid; wider heads use a softmax.
    pub fn probabilities(&self, input: &Tensor) -> Result<Vec<f32>> {
        let logits = self
            .head
            .forward(input)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))?;

        let probs = if self.metadata.num_classes == 1 {
            candle_nn::ops::sigmoid(&logits)
        } else {
            candle_nn::ops::softmax(&logits, D::Minus1)
        }
        .map_err(|e| Error::inference(format!("Failed to normalize logits: {}", e)))?;

        probs
            .squeeze(0)
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| Error::inference(format!("Failed to read probabilities: {}", e)))
    }

    /// Get reference to the device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Get model metadata
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Side length of the square input image
    pub fn input_size(&self) -> usize {
        self.metadata.input_size
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.metadata.num_classes
    }

    /// Resolved version of this model
    pub fn version(&self) -> &str {
        &self.metadata.version
    }
}

fn take_f32(tensors: &mut HashMap<String, Tensor>, name: &ModelId, key: &str) -> Result<Tensor> {
    tensors
        .remove(key)
        .ok_or_else(|| Error::invalid_model(format!("'{}' is missing tensor {}", name, key)))?
        .to_dtype(DType::F32)
        .map_err(|e| Error::invalid_model(format!("'{}': {} is not numeric: {}", name, key, e)))
}

/// Side `S` such that `3 * S * S == features`
fn square_side(features: usize) -> Option<usize> {
    if features == 0 || features % 3 != 0 {
        return None;
    }
    let pixels = features / 3;
    let side = (pixels as f64).sqrt().round() as usize;
    (side * side == pixels).then_some(side)
}
