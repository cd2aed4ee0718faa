//! Pretrained model configuration as published next to the WD tagger weights.
//!
//! The hub `config.json` follows the timm layout; only the fields needed to
//! resolve the input transform are kept.

use crate::{error::Result, file::ModelHub};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub architecture: String,
    pub num_classes: u32,
    #[serde(default)]
    pub num_features: u32,
    pub pretrained_cfg: PretrainedCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainedCfg {
    pub input_size: Vec<u32>, // [channels, height, width]
    #[serde(default)]
    pub fixed_input_size: bool,
    #[serde(default = "default_interpolation")]
    pub interpolation: String,
    #[serde(default = "default_mean_std")]
    pub mean: Vec<f32>,
    #[serde(default = "default_mean_std")]
    pub std: Vec<f32>,
    pub num_classes: u32,
}

fn default_interpolation() -> String {
    "bicubic".to_string()
}

fn default_mean_std() -> Vec<f32> {
    vec![0.5, 0.5, 0.5]
}

impl ModelConfig {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let json = fs::read_to_string(config_path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_pretrained(hub: &ModelHub, repo_id: &str) -> Result<Self> {
        let config_file = hub.config_file(repo_id).await?;
        Self::load(config_file)
    }

    /// Input `(height, width)` of the network.
    pub fn input_hw(&self) -> Option<(u32, u32)> {
        match self.pretrained_cfg.input_size.as_slice() {
            [_, h, w] => Some((*h, *w)),
            _ => None,
        }
    }
}
