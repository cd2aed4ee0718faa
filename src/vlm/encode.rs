//! Shrinks and re-encodes images before they are embedded in a chat request.

use std::io::Cursor;

use base64::Engine;
use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ExtendedColorType,
    ImageEncoder,
};

use crate::{error::Result, processor::ensure_rgb};

/// Scales down so the longest side is at most `max_side`; never upscales.
pub fn fit_within(image: &DynamicImage, max_side: u32) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let scale = (max_side as f64 / w as f64).min(max_side as f64 / h as f64);
    if scale >= 1.0 {
        return image.clone();
    }
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);
    image.resize_exact(new_w, new_h, FilterType::Lanczos3)
}

/// JPEG bytes of `image` at `quality`, transparency flattened onto white.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = ensure_rgb(image);
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf.into_inner())
}

/// Resizes, JPEG-encodes and base64-encodes `image` for a data URL.
pub fn encode_for_vlm(image: &DynamicImage, max_side: u32, quality: u8) -> Result<String> {
    let jpeg = encode_jpeg(&fit_within(image, max_side), quality)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
}

/// `data:` URL carrying a base64 JPEG.
pub fn jpeg_data_url(base64_jpeg: &str) -> String {
    format!("data:image/jpeg;base64,{base64_jpeg}")
}
