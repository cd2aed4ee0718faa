//! # Error Handling
//!
//! This module defines the error types for the `wdcaption` library.
//!
//! `TaggerError` covers everything that can go wrong between receiving an
//! encoded image and producing a caption. The HTTP layer flattens all of them
//! into a single negative response code, so the variants exist for logging and
//! for tests rather than for the wire.

use thiserror::Error;

/// Errors raised while decoding, tagging, or captioning an image.
#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cannot identify image file: {0}")]
    Image(#[from] image::ImageError),

    #[error("unusable image: {0}")]
    InvalidImage(String),

    #[error("model hub error: {0}")]
    Hub(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("label error: {0}")]
    Labels(String),

    #[error("VLM request failed: {0}")]
    Vlm(String),

    #[error("VLM returned malformed JSON: {0}")]
    MalformedResponse(String),

    #[error("{0} model returned an empty caption")]
    EmptyCaption(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("background task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<hf_hub::api::tokio::ApiError> for TaggerError {
    fn from(e: hf_hub::api::tokio::ApiError) -> Self {
        TaggerError::Hub(e.to_string())
    }
}

impl From<tokio::task::JoinError> for TaggerError {
    fn from(e: tokio::task::JoinError) -> Self {
        TaggerError::Join(e.to_string())
    }
}

pub type Result<T, E = TaggerError> = std::result::Result<T, E>;

/// Errors raised while loading the service settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}
