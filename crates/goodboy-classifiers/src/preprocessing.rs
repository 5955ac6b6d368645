//! Image decoding and tensor preparation

use candle_core::{Device, Tensor};
use goodboy_core::{Error, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Pixel normalization applied after resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Scale channels to `[0, 1]`
    #[default]
    Unit,
    /// Scale to `[0, 1]`, then standardize with ImageNet mean/std
    Imagenet,
}

impl Normalization {
    #[inline]
    fn apply(self, channel: usize, value: u8) -> f32 {
        let scaled = f32::from(value) / 255.0;
        match self {
            Self::Unit => scaled,
            Self::Imagenet => (scaled - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        }
    }
}

impl std::str::FromStr for Normalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" => Ok(Self::Unit),
            "imagenet" => Ok(Self::Imagenet),
            other => Err(Error::config(format!("unknown normalization '{}'", other))),
        }
    }
}

/// Decode uploaded bytes as an image
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::invalid_image("empty upload"));
    }

    image::load_from_memory(bytes)
        .map_err(|e| Error::invalid_image(format!("cannot decode image: {}", e)))
}

/// Resize to `side x side` RGB and flatten channel-first (CHW)
pub fn to_chw(image: &DynamicImage, side: usize, normalization: Normalization) -> Result<Vec<f32>> {
    let side_px = u32::try_from(side)
        .map_err(|_| Error::inference(format!("input size {} is too large", side)))?;

    let rgb = image
        .resize_exact(side_px, side_px, FilterType::Triangle)
        .to_rgb8();

    let mut data = Vec::with_capacity(3 * side * side);
    for channel in 0..3 {
        data.extend(
            rgb.pixels()
                .map(|pixel| normalization.apply(channel, pixel.0[channel])),
        );
    }

    Ok(data)
}

/// Decode and convert raw image bytes into a `[1, 3*side*side]` tensor
pub fn preprocess(
    bytes: &[u8],
    side: usize,
    normalization: Normalization,
    device: &Device,
) -> Result<Tensor> {
    let image = decode_image(bytes)?;
    let data = to_chw(&image, side, normalization)?;
    let len = data.len();

    Tensor::from_vec(data, (1, len), device)
        .map_err(|e| Error::inference(format!("Failed to create input tensor: {}", e)))
}
