//! Downloads and caches WD tagger files from the Hugging Face Hub.
//!
//! Files already present in the hub cache are returned without touching the
//! network.

use crate::error::Result;
use hf_hub::api::tokio::{Api, ApiBuilder};
use std::path::PathBuf;
use tracing::debug;

/// ONNX export of the tagger.
pub const MODEL_FILE: &str = "model.onnx";
/// CSV file that has the list of tags and their categories.
pub const TAGS_FILE: &str = "selected_tags.csv";
/// timm pretrained configuration.
pub const CONFIG_FILE: &str = "config.json";

/// Thin handle over the hub client.
#[derive(Clone)]
pub struct ModelHub {
    api: Api,
}

impl ModelHub {
    /// Creates a hub client. With no `cache_dir`, the default hub cache
    /// (`HF_HOME` or `~/.cache/huggingface`) is used.
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let builder = match cache_dir {
            Some(dir) => ApiBuilder::new().with_cache_dir(dir),
            None => ApiBuilder::new(),
        };
        let api = builder.with_progress(false).build()?;
        Ok(Self { api })
    }

    /// Fetches `file_name` from `repo_id`, downloading it on first use.
    pub async fn get(&self, repo_id: &str, file_name: &str) -> Result<PathBuf> {
        debug!(repo_id, file_name, "resolving hub file");
        let path = self.api.model(repo_id.to_string()).get(file_name).await?;
        Ok(path)
    }

    pub async fn model_file(&self, repo_id: &str) -> Result<PathBuf> {
        self.get(repo_id, MODEL_FILE).await
    }

    pub async fn tags_file(&self, repo_id: &str) -> Result<PathBuf> {
        self.get(repo_id, TAGS_FILE).await
    }

    pub async fn config_file(&self, repo_id: &str) -> Result<PathBuf> {
        self.get(repo_id, CONFIG_FILE).await
    }
}
