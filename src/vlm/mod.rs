//! Remote captioning through a vision-language model.
//!
//! The model sits behind an OpenAI-compatible chat completion API and is
//! prompted to answer with a JSON object whose `final_prompt` field is the
//! caption.

pub mod client;
pub mod encode;
pub mod prompt;

pub use client::VlmClient;
pub use encode::encode_for_vlm;
pub use prompt::FluxPrompt;
