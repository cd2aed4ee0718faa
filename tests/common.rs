use std::{
    io::Cursor,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use wdcaption::{
    captioner::Captioner,
    error::{Result, TaggerError},
};

/// A neutral gray image.
#[allow(dead_code)]
pub fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
}

/// PNG-encodes and base64-encodes an image.
#[allow(dead_code)]
pub fn to_base64_png(image: &DynamicImage) -> String {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
}

/// What a `FakeCaptioner` answers with.
#[allow(dead_code)]
pub enum Reply {
    Caption(&'static str),
    Fail(&'static str),
}

/// A captioner with a canned reply that counts its invocations.
#[allow(dead_code)]
pub struct FakeCaptioner {
    name: &'static str,
    reply: Reply,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeCaptioner {
    pub fn new(name: &'static str, reply: Reply) -> Self {
        Self {
            name,
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Captioner for FakeCaptioner {
    fn name(&self) -> &str {
        self.name
    }

    async fn caption(&self, _image: &DynamicImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Caption(caption) => Ok(caption.to_string()),
            Reply::Fail(message) => Err(TaggerError::Inference(message.to_string())),
        }
    }
}
