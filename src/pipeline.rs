//! This module provides a high-level `TaggingPipeline` for processing images and generating tags.
//!
//! The pipeline combines a `TaggerModel`, an `ImagePreprocessor` and the label
//! vocabulary. Post-processing splits the probabilities into rating, character
//! and general buckets, thresholds and sorts them, and assembles the caption.

use image::DynamicImage;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use crate::{
    config::ModelConfig,
    error::{Result, TaggerError},
    file::ModelHub,
    processor::{ImagePreprocessor, ImageProcessor, Layout},
    tagger::{Activation, TaggerModel},
    tags::{fix_tag_underscore, LabelTags},
};

/// A type alias for a map of tag predictions, from tag name to confidence score.
pub type Prediction = IndexMap<String, f32>;

/// Minimum confidence for a tag to enter the caption. Comparison is strict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub general: f32,
    pub character: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            general: 0.35,
            character: 0.75,
        }
    }
}

/// The result of a tagging operation, with tags categorized and sorted by confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggingResult {
    /// Every rating label with its score, in vocabulary order.
    pub rating: Prediction,
    /// Character tags above the character threshold.
    pub character: Prediction,
    /// General tags above the general threshold.
    pub general: Prediction,
}

impl TaggingResult {
    /// General tags followed by character tags, joined with `", "`.
    pub fn caption(&self) -> String {
        self.general
            .keys()
            .chain(self.character.keys())
            .join(", ")
    }

    /// The caption in prompt syntax: underscores as spaces, parentheses escaped.
    pub fn taglist(&self) -> String {
        self.general
            .keys()
            .chain(self.character.keys())
            .map(|tag| {
                fix_tag_underscore(tag)
                    .replace('(', "\\(")
                    .replace(')', "\\)")
            })
            .join(", ")
    }

    /// The highest scoring rating label.
    pub fn top_rating(&self) -> Option<(&str, f32)> {
        self.rating
            .iter()
            .fold(None, |best: Option<(&str, f32)>, (name, &prob)| match best {
                Some((_, p)) if p >= prob => best,
                _ => Some((name.as_str(), prob)),
            })
    }
}

/// Keeps the indices scoring above `threshold`, most confident first.
///
/// The sort is stable, so equal scores stay in vocabulary order.
fn select(labels: &LabelTags, probs: &[f32], indices: &[usize], threshold: f32) -> Prediction {
    indices
        .iter()
        .filter(|&&idx| probs[idx] > threshold)
        .sorted_by(|&&a, &&b| {
            probs[b]
                .partial_cmp(&probs[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|&idx| (labels.names()[idx].clone(), probs[idx]))
        .collect()
}

/// Buckets one probability vector by category.
pub fn categorize(labels: &LabelTags, probs: &[f32], thresholds: Thresholds) -> Result<TaggingResult> {
    if probs.len() != labels.len() {
        return Err(TaggerError::Labels(format!(
            "Tags and probabilities length mismatch ({} labels, {} scores)",
            labels.len(),
            probs.len()
        )));
    }

    let rating = labels
        .rating()
        .iter()
        .map(|&idx| (labels.names()[idx].clone(), probs[idx]))
        .collect();

    Ok(TaggingResult {
        rating,
        character: select(labels, probs, labels.character(), thresholds.character),
        general: select(labels, probs, labels.general(), thresholds.general),
    })
}

/// An end-to-end pipeline for image tagging.
#[derive(Debug)]
pub struct TaggingPipeline {
    /// The underlying ONNX model for tagging.
    pub model: TaggerModel,
    /// The preprocessor for preparing images.
    pub preprocessor: ImagePreprocessor,
    /// The set of labels the model can predict.
    pub tags: LabelTags,
    pub thresholds: Thresholds,
}

impl TaggingPipeline {
    pub fn new(
        model: TaggerModel,
        preprocessor: ImagePreprocessor,
        tags: LabelTags,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            model,
            preprocessor,
            tags,
            thresholds,
        }
    }

    /// Creates a pipeline from a pretrained model on the Hugging Face Hub.
    ///
    /// `TaggerModel::init` must have been called first.
    pub async fn from_pretrained(
        hub: &ModelHub,
        repo_id: &str,
        layout: Layout,
        activation: Activation,
    ) -> Result<Self> {
        let model = TaggerModel::from_pretrained(hub, repo_id, activation).await?;

        let config = ModelConfig::from_pretrained(hub, repo_id).await?;
        let preprocessor = ImagePreprocessor::from_model_config(&config, layout)?;

        let tags = LabelTags::from_pretrained(hub, repo_id).await?;
        if tags.len() != config.num_classes as usize {
            return Err(TaggerError::Labels(format!(
                "{repo_id} declares {} classes but lists {} tags",
                config.num_classes,
                tags.len()
            )));
        }

        Ok(Self::new(model, preprocessor, tags, Thresholds::default()))
    }

    /// Predicts tags for a single image.
    pub fn predict(&mut self, image: &DynamicImage) -> Result<TaggingResult> {
        let mut results = self.predict_batch(vec![image])?;
        results.pop().ok_or_else(|| {
            TaggerError::Inference("Prediction batch returned no results".to_string())
        })
    }

    /// Predicts tags for a batch of images.
    pub fn predict_batch(&mut self, images: Vec<&DynamicImage>) -> Result<Vec<TaggingResult>> {
        let batch = images.len();
        let tensor = self.preprocessor.process_batch(images)?;

        debug!(batch, shape = ?tensor.shape(), "running model prediction");
        let probs = self.model.predict(tensor)?;

        probs
            .iter()
            .map(|p| categorize(&self.tags, p, self.thresholds))
            .collect()
    }
}
