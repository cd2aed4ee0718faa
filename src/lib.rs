//! # wdcaption
//!
//! wdcaption turns images into captions. It ships an HTTP service whose
//! `POST /tag_image` endpoint accepts a base64 image and answers with either
//! a comma-separated tag caption from a local WD tagger or a Flux-style
//! prompt from a remote vision-language model.
//!
//! ## Modules
//!
//! - `pipeline`: WD post-processing (bucketing, thresholds, caption assembly).
//! - `tagger`: ONNX Runtime session management and the supported models.
//! - `processor`: image preprocessing (alpha flattening, square padding, BGR).
//! - `tags`: the tag vocabulary.
//! - `file` / `config`: hub downloads and pretrained model configuration.
//! - `cache`: load-once model memoisation.
//! - `vlm`: the OpenAI-compatible VLM client.
//! - `captioner`: the backend trait and its two implementations.
//! - `service` / `server`: request dispatch and the axum router.
//! - `settings`: TOML service configuration.
//! - `error`: error types.

pub mod cache;
pub mod captioner;
pub mod config;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod prelude;
pub mod processor;
pub mod server;
pub mod service;
pub mod settings;
pub mod tagger;
pub mod tags;
pub mod vlm;
