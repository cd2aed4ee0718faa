//! Service configuration.
//!
//! Settings are read from a TOML file (`config.toml` by default). Every
//! section and field has a default, so an empty or missing file is valid.
//! Secrets may be written as `${ENV_VAR}` and are resolved at use.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, processor::Layout, tagger::{Activation, Device, WdModel}};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub wd: WdSettings,
    pub vlm: VlmSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum request body in megabytes.
    pub body_limit_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6004,
            body_limit_mb: 32,
        }
    }
}

/// Upper bound for `server.body_limit_mb`.
pub const MAX_BODY_LIMIT_MB: usize = 1024;

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Body limit in bytes, clamped to `MAX_BODY_LIMIT_MB`.
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.min(MAX_BODY_LIMIT_MB) * 1024 * 1024
    }
}

/// Checks that a tag threshold lies in `[0, 1]`.
pub fn check_threshold(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{name} must be between 0.0 and 1.0"
        )))
    }
}

/// Local WD tagger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WdSettings {
    /// One of `vit`, `swinv2`, `convnext`, `vit-large`, `eva02-large`.
    pub model: String,
    pub gen_threshold: f32,
    pub char_threshold: f32,
    /// Load the model at startup instead of on the first request.
    pub preload: bool,
    /// Hub cache directory; the default hub cache when unset.
    pub cache_dir: Option<PathBuf>,
    /// `cpu`, or `cuda[:id]` / `tensorrt[:id]` / `coreml` with the matching feature.
    pub device: String,
    /// `nhwc` for the ONNX exports, `nchw` for normalised channel-first inputs.
    pub layout: String,
    /// `auto`, `sigmoid` or `identity`.
    pub activation: String,
}

impl Default for WdSettings {
    fn default() -> Self {
        Self {
            model: "vit".to_string(),
            gen_threshold: 0.35,
            char_threshold: 0.75,
            preload: true,
            cache_dir: None,
            device: "cpu".to_string(),
            layout: "nhwc".to_string(),
            activation: "auto".to_string(),
        }
    }
}

impl WdSettings {
    pub fn model(&self) -> Result<WdModel, ConfigError> {
        self.model
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("wd.model: {e}")))
    }

    pub fn device(&self) -> Result<Device, ConfigError> {
        self.device
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("wd.device: {e}")))
    }

    pub fn layout(&self) -> Result<Layout, ConfigError> {
        self.layout
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("wd.layout: {e}")))
    }

    pub fn activation(&self) -> Result<Activation, ConfigError> {
        self.activation
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("wd.activation: {e}")))
    }
}

/// Remote vision-language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VlmSettings {
    pub enabled: bool,
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,
    /// API root of an OpenAI-compatible server.
    pub base_url: String,
    pub model_name: String,
    /// Longest image side sent to the model.
    pub max_side: u32,
    pub jpeg_quality: u8,
    pub timeout_secs: u64,
    /// Retry failed VLM captions with the WD tagger.
    pub fallback_to_wd: bool,
}

impl Default for VlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: "${VLM_API_KEY}".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            max_side: 512,
            jpeg_quality: 90,
            timeout_secs: 60,
            fallback_to_wd: true,
        }
    }
}

impl VlmSettings {
    /// The API key with `${ENV_VAR}` references resolved.
    pub fn api_key(&self) -> Option<String> {
        resolve_env_var(&self.api_key)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: error, warn, info, debug, trace
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Settings {
    /// Loads `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let settings = Self::default();
            settings.validate()?;
            Ok(settings)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be > 0".into()));
        }
        if !(1..=MAX_BODY_LIMIT_MB).contains(&self.server.body_limit_mb) {
            return Err(ConfigError::ValidationError(format!(
                "server.body_limit_mb must be between 1 and {MAX_BODY_LIMIT_MB}"
            )));
        }
        check_threshold("wd.gen_threshold", self.wd.gen_threshold)?;
        check_threshold("wd.char_threshold", self.wd.char_threshold)?;
        self.wd.model()?;
        self.wd.device()?;
        self.wd.layout()?;
        self.wd.activation()?;

        if self.vlm.max_side == 0 {
            return Err(ConfigError::ValidationError("vlm.max_side must be > 0".into()));
        }
        if !(1..=100).contains(&self.vlm.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "vlm.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.vlm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "vlm.timeout_secs must be > 0".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_settings_pass_validation() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.addr(), "0.0.0.0:6004");
        assert_eq!(settings.wd.model().unwrap(), WdModel::Vit);
    }

    #[test]
    fn test_empty_file_is_default() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.wd.gen_threshold, 0.35);
        assert_eq!(settings.wd.char_threshold, 0.75);
        assert_eq!(settings.vlm.max_side, 512);
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [wd]
            model = "swinv2"

            [vlm]
            base_url = "http://127.0.0.1:8000/v1"
            model_name = "qwen2.5-vl"
            fallback_to_wd = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.wd.model().unwrap(), WdModel::SwinV2);
        assert_eq!(settings.wd.gen_threshold, 0.35);
        assert_eq!(settings.vlm.model_name, "qwen2.5-vl");
        assert!(!settings.vlm.fallback_to_wd);
        assert_eq!(settings.server.port, 6004);
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut settings = Settings::default();
        settings.wd.char_threshold = 1.5;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("wd.char_threshold"));
    }

    #[test]
    fn test_validate_rejects_huge_body_limit() {
        let mut settings = Settings::default();
        settings.server.body_limit_mb = usize::MAX;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("server.body_limit_mb"));
        assert_eq!(
            settings.server.body_limit_bytes(),
            MAX_BODY_LIMIT_MB * 1024 * 1024
        );

        settings.server.body_limit_mb = 32;
        assert_eq!(settings.server.body_limit_bytes(), 32 * 1024 * 1024);
    }

    #[test]
    fn test_check_threshold() {
        assert!(check_threshold("gen", 0.0).is_ok());
        assert!(check_threshold("gen", 1.0).is_ok());
        assert!(check_threshold("gen", -0.1).is_err());
        assert!(check_threshold("gen", f32::NAN).is_err());
        let err = check_threshold("--char-threshold", 1.5).unwrap_err();
        assert!(err.to_string().contains("--char-threshold"));
    }

    #[test]
    fn test_validate_rejects_unknown_model() {
        let err = Settings::from_toml("[wd]\nmodel = \"resnet\"\n").unwrap_err();
        assert!(err.to_string().contains("wd.model"));
    }

    #[test]
    fn test_validate_rejects_bad_jpeg_quality() {
        let mut settings = Settings::default();
        settings.vlm.jpeg_quality = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Settings::from_toml("[server\nport = 1"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.server.port, 6004);
    }

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("${WDCAPTION_SURELY_UNSET_VAR}"), None);
    }
}
