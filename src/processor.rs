//! This module provides tools for preprocessing images before they are fed into a model.
//!
//! WD taggers expect a square, white-padded image with transparency flattened
//! onto white and channels in BGR order. `ImagePreprocessor` performs those
//! steps, resizes to the network input size and lays the pixels out as either
//! NHWC (the ONNX exports, raw 0..255 values) or NCHW (normalised with the
//! pretrained mean/std).

use std::{fmt, str::FromStr};

use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};
use ndarray::{Array, Axis, Ix4};
use rayon::prelude::*;

use crate::{
    config::ModelConfig,
    error::{Result, TaggerError},
};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Memory layout of the input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `[batch, height, width, channels]`
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

impl FromStr for Layout {
    type Err = TaggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(TaggerError::Inference(format!("unknown tensor layout: {other}"))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Nhwc => f.write_str("nhwc"),
            Layout::Nchw => f.write_str("nchw"),
        }
    }
}

/// Maps a timm interpolation name to the closest `image` filter.
pub fn filter_for(interpolation: &str) -> FilterType {
    match interpolation {
        "nearest" => FilterType::Nearest,
        "bilinear" => FilterType::Triangle,
        "lanczos" | "lanczos3" => FilterType::Lanczos3,
        _ => FilterType::CatmullRom,
    }
}

/// Converts any image to RGB. Transparent pixels are composited over white.
pub fn ensure_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Pads to a square on a white background, keeping the image centred.
pub fn pad_square(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let side = width.max(height);
    if width == height {
        return image.clone();
    }

    let mut canvas = RgbImage::from_pixel(side, side, WHITE);
    image::imageops::replace(
        &mut canvas,
        image,
        ((side - width) / 2) as i64,
        ((side - height) / 2) as i64,
    );
    canvas
}

/// A trait for processing images into tensors suitable for model input.
pub trait ImageProcessor {
    /// Processes a single image into a 4D tensor.
    fn process(&self, image: &DynamicImage) -> Result<Array<f32, Ix4>>;

    /// Processes a batch of images into a single 4D tensor.
    fn process_batch(&self, images: Vec<&DynamicImage>) -> Result<Array<f32, Ix4>>
    where
        Self: Sync,
    {
        let tensors: Result<Vec<_>> =
            images.into_par_iter().map(|img| self.process(img)).collect();
        let tensors = tensors?;

        ndarray::concatenate(
            Axis(0),
            &tensors.iter().map(|t| t.view()).collect::<Vec<_>>(),
        )
        .map_err(|e| TaggerError::Inference(format!("Failed to concatenate tensors: {e}")))
    }
}

/// Square-pads, resizes and lays out images for a WD tagger.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    pub height: u32,
    pub width: u32,
    pub layout: Layout,
    pub filter: FilterType,
    /// Per-channel `(mean, std)` in RGB order; `None` feeds raw 0..255 values.
    pub normalize: Option<(Vec<f32>, Vec<f32>)>,
    pub bgr: bool,
}

impl ImagePreprocessor {
    /// Creates a preprocessor producing raw BGR pixels.
    pub fn new(height: u32, width: u32, layout: Layout) -> Self {
        Self {
            height,
            width,
            layout,
            filter: FilterType::CatmullRom,
            normalize: None,
            bgr: true,
        }
    }

    pub fn with_normalization(mut self, mean: Vec<f32>, std: Vec<f32>) -> Self {
        self.normalize = Some((mean, std));
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Resolves the transform from a pretrained config.
    ///
    /// NHWC inputs are the ONNX exports, which normalise inside the graph, so
    /// mean/std are only applied for NCHW.
    pub fn from_model_config(config: &ModelConfig, layout: Layout) -> Result<Self> {
        let (height, width) = config.input_hw().ok_or_else(|| {
            TaggerError::Inference(format!(
                "Invalid input size {:?}",
                config.pretrained_cfg.input_size
            ))
        })?;

        let preprocessor = Self::new(height, width, layout)
            .with_filter(filter_for(&config.pretrained_cfg.interpolation));

        Ok(match layout {
            Layout::Nhwc => preprocessor,
            Layout::Nchw => preprocessor.with_normalization(
                config.pretrained_cfg.mean.clone(),
                config.pretrained_cfg.std.clone(),
            ),
        })
    }

    fn value(&self, pixel: u8, channel: usize) -> f32 {
        match &self.normalize {
            Some((mean, std)) => (pixel as f32 / 255.0 - mean[channel]) / std[channel],
            None => pixel as f32,
        }
    }

    /// Writes pixels into the tensor, reordering channels when `bgr` is set.
    fn to_tensor(&self, image: &RgbImage) -> Array<f32, Ix4> {
        let (h, w) = (self.height as usize, self.width as usize);
        let mut tensor = match self.layout {
            Layout::Nhwc => Array::zeros((1, h, w, 3)),
            Layout::Nchw => Array::zeros((1, 3, h, w)),
        };

        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for src in 0..3 {
                let dst = if self.bgr { 2 - src } else { src };
                let v = self.value(pixel.0[src], src);
                match self.layout {
                    Layout::Nhwc => tensor[[0, y, x, dst]] = v,
                    Layout::Nchw => tensor[[0, dst, y, x]] = v,
                }
            }
        }

        tensor
    }
}

impl ImageProcessor for ImagePreprocessor {
    fn process(&self, image: &DynamicImage) -> Result<Array<f32, Ix4>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TaggerError::InvalidImage("image has no pixels".to_string()));
        }
        if let Some((mean, std)) = &self.normalize {
            if mean.len() < 3 || std.len() < 3 {
                return Err(TaggerError::Inference(
                    "normalization needs three channels".to_string(),
                ));
            }
        }

        let square = pad_square(&ensure_rgb(image));
        let resized = if square.dimensions() == (self.width, self.height) {
            square
        } else {
            image::imageops::resize(&square, self.width, self.height, self.filter)
        };

        Ok(self.to_tensor(&resized))
    }
}
