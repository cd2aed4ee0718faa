//! The two interchangeable caption backends.
//!
//! `WdCaptioner` runs a WD tagger locally and joins the selected tags;
//! `VlmCaptioner` asks a remote vision-language model for a Flux prompt.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, info};

use crate::{
    cache::ModelCache,
    error::{Result, TaggerError},
    file::ModelHub,
    pipeline::{TaggingPipeline, TaggingResult, Thresholds},
    processor::Layout,
    tagger::{Activation, WdModel},
    vlm::{encode_for_vlm, VlmClient},
};

/// Anything that turns an image into a caption.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Backend name used in logs and error messages (e.g. "WD", "VLM").
    fn name(&self) -> &str;

    async fn caption(&self, image: &DynamicImage) -> Result<String>;
}

pub type SharedPipeline = Arc<Mutex<TaggingPipeline>>;

/// Local WD tagger backend with load-once model caching.
pub struct WdCaptioner {
    hub: ModelHub,
    model: WdModel,
    thresholds: Thresholds,
    layout: Layout,
    activation: Activation,
    pipelines: ModelCache<WdModel, Mutex<TaggingPipeline>>,
}

impl WdCaptioner {
    pub fn new(
        hub: ModelHub,
        model: WdModel,
        thresholds: Thresholds,
        layout: Layout,
        activation: Activation,
    ) -> Self {
        Self {
            hub,
            model,
            thresholds,
            layout,
            activation,
            pipelines: ModelCache::new(),
        }
    }

    pub fn model(&self) -> WdModel {
        self.model
    }

    /// Returns the pipeline for `model`, downloading and loading it on first use.
    pub async fn pipeline(&self, model: WdModel) -> Result<SharedPipeline> {
        self.pipelines
            .get_or_load(&model, || async {
                info!(model = %model, repo_id = model.repo_id(), "loading WD tagger");
                let mut pipeline = TaggingPipeline::from_pretrained(
                    &self.hub,
                    model.repo_id(),
                    self.layout,
                    self.activation,
                )
                .await?;
                pipeline.thresholds = self.thresholds;
                info!(model = %model, labels = pipeline.tags.len(), "WD tagger ready");
                Ok(Mutex::new(pipeline))
            })
            .await
    }

    /// Loads the configured model ahead of the first request.
    pub async fn preload(&self) -> Result<()> {
        self.pipeline(self.model).await.map(|_| ())
    }

    /// Tags a batch of images with `model` on the blocking thread pool.
    pub async fn tag_batch(
        &self,
        model: WdModel,
        images: Vec<DynamicImage>,
    ) -> Result<Vec<TaggingResult>> {
        let pipeline = self.pipeline(model).await?;
        tokio::task::spawn_blocking(move || {
            let mut pipeline = pipeline
                .lock()
                .map_err(|_| TaggerError::Inference("tagger lock poisoned".to_string()))?;
            pipeline.predict_batch(images.iter().collect())
        })
        .await?
    }

    pub async fn tag(&self, image: DynamicImage) -> Result<TaggingResult> {
        self.tag_batch(self.model, vec![image])
            .await?
            .pop()
            .ok_or_else(|| TaggerError::Inference("Prediction returned no results".to_string()))
    }
}

#[async_trait]
impl Captioner for WdCaptioner {
    fn name(&self) -> &str {
        "WD"
    }

    async fn caption(&self, image: &DynamicImage) -> Result<String> {
        let result = self.tag(image.clone()).await?;
        debug!(
            general = result.general.len(),
            character = result.character.len(),
            rating = ?result.top_rating(),
            "tagged image"
        );
        Ok(result.caption())
    }
}

/// Remote VLM backend.
pub struct VlmCaptioner {
    client: VlmClient,
    max_side: u32,
    jpeg_quality: u8,
}

impl VlmCaptioner {
    pub fn new(client: VlmClient, max_side: u32, jpeg_quality: u8) -> Self {
        Self {
            client,
            max_side,
            jpeg_quality,
        }
    }
}

#[async_trait]
impl Captioner for VlmCaptioner {
    fn name(&self) -> &str {
        "VLM"
    }

    async fn caption(&self, image: &DynamicImage) -> Result<String> {
        let image = image.clone();
        let (max_side, quality) = (self.max_side, self.jpeg_quality);
        let encoded =
            tokio::task::spawn_blocking(move || encode_for_vlm(&image, max_side, quality))
                .await??;

        let prompt = self.client.describe(&encoded).await?;
        Ok(prompt.final_prompt)
    }
}
