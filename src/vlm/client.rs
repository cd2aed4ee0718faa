//! OpenAI-compatible Chat Completions client.
//!
//! Sends the image as a data URL in the user message and asks for a JSON
//! object reply.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    encode::jpeg_data_url,
    prompt::{FluxPrompt, SYSTEM_PROMPT, USER_QUERY},
};
use crate::error::{Result, TaggerError};

pub struct VlmClient {
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl VlmClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ChatContent>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Parses the assistant reply into a prompt; the reply must be a JSON object.
pub fn parse_flux_prompt(content: &str) -> Result<FluxPrompt> {
    let value: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| TaggerError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(TaggerError::MalformedResponse(format!(
            "expected a JSON object, got {value}"
        )));
    }
    serde_json::from_value(value).map_err(|e| TaggerError::MalformedResponse(e.to_string()))
}

impl VlmClient {
    /// Asks the model for a Flux prompt describing a base64 JPEG.
    pub async fn describe(&self, base64_jpeg: &str) -> Result<FluxPrompt> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ChatContent::Text {
                            text: USER_QUERY.to_string(),
                        },
                        ChatContent::ImageUrl {
                            image_url: ImageUrl {
                                url: jpeg_data_url(base64_jpeg),
                            },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TaggerError::Vlm(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TaggerError::Vlm(format!("HTTP {status}: {text}")));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TaggerError::Vlm(format!("failed to parse response: {e}")))?;

        let content = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TaggerError::Vlm("response has no message content".to_string()))?;

        debug!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "VLM replied"
        );

        let prompt = parse_flux_prompt(&content).inspect_err(|e| {
            warn!(error = %e, "VLM reply is not a JSON object");
        })?;

        if prompt.final_prompt.trim().is_empty() {
            return Err(TaggerError::EmptyCaption("VLM".to_string()));
        }

        Ok(prompt)
    }
}
