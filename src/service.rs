//! Request dispatch for `/tag_image`.
//!
//! Decodes the image once, routes it to the backend chosen by `category`,
//! and folds every outcome into the `{code, msg, data}` envelope. Errors never
//! escape as HTTP failures; they become `code = -1` with a readable message.

use std::sync::Arc;

use base64::Engine;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{
    captioner::Captioner,
    error::{Result, TaggerError},
};

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_FAILURE: i32 = -1;

fn default_category() -> String {
    "sdxl".to_string()
}

fn default_format() -> Option<String> {
    Some("jpeg".to_string())
}

/// Body of `POST /tag_image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRequest {
    pub image_base64: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_format")]
    pub format: Option<String>,
}

impl TagRequest {
    pub fn new(image_base64: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            image_base64: image_base64.into(),
            category: category.into(),
            format: default_format(),
        }
    }
}

/// Which backend a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Local WD tagger; also used for unrecognised categories.
    Sdxl,
    /// Remote VLM.
    Flux,
}

impl Category {
    pub fn from_name(name: &str) -> Self {
        match name {
            "flux" => Category::Flux,
            _ => Category::Sdxl,
        }
    }
}

/// The response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl ApiResponse {
    pub fn success(caption: String) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: "success".to_string(),
            data: json!({ "caption": caption }),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILURE,
            msg: msg.into(),
            data: Value::Object(Map::new()),
        }
    }

    pub fn caption(&self) -> Option<&str> {
        self.data.get("caption").and_then(Value::as_str)
    }
}

/// Decodes standard base64, tolerating whitespace and a `data:...;base64,` prefix.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let payload = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(cleaned)?)
}

/// Base64 payload to decoded image.
pub fn decode_image(payload: &str) -> Result<DynamicImage> {
    let bytes = decode_base64(payload)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Routes requests to the WD tagger or the VLM.
#[derive(Clone)]
pub struct TagService {
    wd: Arc<dyn Captioner>,
    vlm: Option<Arc<dyn Captioner>>,
    fallback_to_wd: bool,
}

impl TagService {
    pub fn new(
        wd: Arc<dyn Captioner>,
        vlm: Option<Arc<dyn Captioner>>,
        fallback_to_wd: bool,
    ) -> Self {
        Self {
            wd,
            vlm,
            fallback_to_wd,
        }
    }

    /// Runs one backend; an empty caption counts as a failure.
    async fn run(backend: &dyn Captioner, image: &DynamicImage) -> Result<String> {
        let caption = backend.caption(image).await?;
        if caption.trim().is_empty() {
            return Err(TaggerError::EmptyCaption(backend.name().to_string()));
        }
        Ok(caption)
    }

    async fn run_wd(&self, image: &DynamicImage) -> ApiResponse {
        match Self::run(self.wd.as_ref(), image).await {
            Ok(caption) => ApiResponse::success(caption),
            Err(e) => {
                warn!(backend = self.wd.name(), error = %e, "captioning failed");
                ApiResponse::failure(format!("{} model processing failed: {e}", self.wd.name()))
            }
        }
    }

    async fn run_vlm(&self, image: &DynamicImage) -> ApiResponse {
        let failure = match &self.vlm {
            Some(vlm) => match Self::run(vlm.as_ref(), image).await {
                Ok(caption) => return ApiResponse::success(caption),
                Err(e) => {
                    warn!(backend = vlm.name(), error = %e, "captioning failed");
                    ApiResponse::failure(format!("{} model processing failed: {e}", vlm.name()))
                }
            },
            None => ApiResponse::failure("VLM model processing failed: VLM is not configured"),
        };

        if self.fallback_to_wd {
            info!("falling back to the WD tagger");
            self.run_wd(image).await
        } else {
            failure
        }
    }

    pub async fn tag(&self, request: &TagRequest) -> ApiResponse {
        let image = match decode_image(&request.image_base64) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "rejecting undecodable image");
                return ApiResponse::failure(format!("image decode failed: {e}"));
            }
        };

        let category = Category::from_name(&request.category);
        info!(
            category = %request.category,
            format = request.format.as_deref().unwrap_or("jpeg"),
            width = image.width(),
            height = image.height(),
            "tagging image"
        );

        match category {
            Category::Sdxl => self.run_wd(&image).await,
            Category::Flux => self.run_vlm(&image).await,
        }
    }
}
