//! Image decoding and tensor preparation
//!
//! Uploaded bytes are decoded with the `image` crate, converted to RGB,
//! resized to the model's input resolution and laid out as a batch of one
//! `f32` NCHW tensor.

use crate::model_config::{
    NormalizationMode, PreprocessingConfig, ResizeFilter, DEFAULT_MAX_SOURCE_DIMENSION,
};
use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::{ImageReader, Limits, RgbImage};
use petlens_core::{Error, InputSize, Result};
use std::io::Cursor;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ImageNet channel means in [0, 255], BGR order
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Turns encoded image bytes into model input tensors
#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: InputSize,
    mode: NormalizationMode,
    filter: ResizeFilter,
    max_source_dimension: u32,
}

impl Preprocessor {
    /// Create a new preprocessor
    pub fn new(size: InputSize, mode: NormalizationMode, filter: ResizeFilter) -> Self {
        Self {
            size,
            mode,
            filter,
            max_source_dimension: DEFAULT_MAX_SOURCE_DIMENSION,
        }
    }

    /// Create a preprocessor from configuration
    pub fn from_config(size: InputSize, config: &PreprocessingConfig) -> Self {
        Self::new(size, config.mode, config.resize_filter)
            .with_max_source_dimension(config.max_source_dimension)
    }

    /// Reject uploads wider or taller than `max` pixels
    pub fn with_max_source_dimension(mut self, max: u32) -> Self {
        self.max_source_dimension = max;
        self
    }

    /// Input resolution
    pub fn size(&self) -> InputSize {
        self.size
    }

    /// Decode and convert to RGB; the format is guessed from the content
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(Error::image("Uploaded file is empty"));
        }

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::image(format!("Failed to read image: {}", e)))?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_source_dimension);
        limits.max_image_height = Some(self.max_source_dimension);
        reader.limits(limits);

        if reader.format().is_none() {
            return Err(Error::image("Unrecognized image format"));
        }

        let image = reader
            .decode()
            .map_err(|e| Error::image(format!("Failed to decode image: {}", e)))?;

        Ok(image.to_rgb8())
    }

    /// Resize and normalize an RGB image into a `(1, 3, H, W)` tensor on the CPU
    pub fn to_tensor(&self, image: &RgbImage) -> Result<Tensor> {
        let (width, height) = (self.size.width, self.size.height);
        let resized = image::imageops::resize(image, width, height, filter_type(self.filter));

        let plane = width as usize * height as usize;
        let mut data = vec![0f32; 3 * plane];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = pixel_offset(x, y, width);
            let values = self.normalize(pixel.0);
            for (channel, value) in values.into_iter().enumerate() {
                data[channel * plane + offset] = value;
            }
        }

        Tensor::from_vec(data, (1, 3, height as usize, width as usize), &Device::Cpu)
            .map_err(|e| Error::image(format!("Failed to build input tensor: {}", e)))
    }

    /// Decode and convert to an input tensor in one step
    pub fn prepare(&self, bytes: &[u8]) -> Result<Tensor> {
        let image = self.decode(bytes)?;
        self.to_tensor(&image)
    }

    /// Normalize one RGB pixel into three channel values in tensor order
    fn normalize(&self, [r, g, b]: [u8; 3]) -> [f32; 3] {
        let rgb = [r as f32, g as f32, b as f32];
        match self.mode {
            NormalizationMode::Tf => rgb.map(|v| v / 127.5 - 1.0),
            NormalizationMode::Unit => rgb.map(|v| v / 255.0),
            NormalizationMode::Torch => {
                let mut out = [0f32; 3];
                for c in 0..3 {
                    out[c] = (rgb[c] / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
                out
            }
            NormalizationMode::Caffe => [
                rgb[2] - CAFFE_MEAN_BGR[0],
                rgb[1] - CAFFE_MEAN_BGR[1],
                rgb[0] - CAFFE_MEAN_BGR[2],
            ],
        }
    }
}

/// Row-major index of a pixel within one channel plane
fn pixel_offset(x: u32, y: u32, width: u32) -> usize {
    y as usize * width as usize + x as usize
}

fn filter_type(filter: ResizeFilter) -> FilterType {
    match filter {
        ResizeFilter::Nearest => FilterType::Nearest,
        ResizeFilter::Triangle => FilterType::Triangle,
        ResizeFilter::CatmullRom => FilterType::CatmullRom,
        ResizeFilter::Gaussian => FilterType::Gaussian,
        ResizeFilter::Lanczos3 => FilterType::Lanczos3,
    }
}
