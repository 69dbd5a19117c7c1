//! LLM client for structured document analysis.
//!
//! Speaks both the OpenAI-compatible chat completions API (OpenAI, Groq,
//! Together) and Ollama's chat API. Both modes ask for a JSON object reply.

mod config;
mod prompts;

use std::time::Duration;

use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use config::{LlmConfig, LlmProvider};
pub use prompts::{DEFAULT_IMAGE_PROMPT, DEFAULT_TEXT_PROMPT, SYSTEM_PROMPT};

use crate::models::StructuredInfo;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM not configured: {0}")]
    NotConfigured(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// LLM client for document analysis.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// OpenAI-compatible chat request.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Extract structured fields from document text.
    pub async fn analyze_text(&self, text: &str) -> Result<StructuredInfo, LlmError> {
        self.ensure_configured()?;
        let truncated = truncate_chars(text, self.config.max_content_chars);
        let prompt = self.config.text_prompt().replace("{content}", truncated);

        debug!(
            "Analyzing {} chars of text with {} ({})",
            truncated.chars().count(),
            self.config.provider_name(),
            self.config.model
        );

        let model = self.config.model.clone();
        let reply = match self.config.provider {
            LlmProvider::OpenAI => self.call_chat(&model, &prompt, None).await?,
            LlmProvider::Ollama => self.call_ollama(&model, &prompt, None).await?,
        };
        parse_structured_reply(&reply)
    }

    /// Describe a JPEG face image and read any legible identity fields.
    pub async fn analyze_image(&self, jpeg: &[u8]) -> Result<StructuredInfo, LlmError> {
        self.ensure_configured()?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(jpeg);
        let model = self.config.vision_model().to_string();

        debug!(
            "Analyzing {} byte face image with {} ({})",
            jpeg.len(),
            self.config.provider_name(),
            model
        );

        let prompt = self.config.image_prompt().to_string();
        let reply = match self.config.provider {
            LlmProvider::OpenAI => {
                self.call_chat(&model, &prompt, Some(image_base64)).await?
            }
            LlmProvider::Ollama => {
                self.call_ollama(&model, &prompt, Some(image_base64)).await?
            }
        };
        parse_structured_reply(&reply)
    }

    fn ensure_configured(&self) -> Result<(), LlmError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(LlmError::NotConfigured(self.config.availability_hint()))
        }
    }

    /// Call an OpenAI-compatible chat completions endpoint.
    async fn call_chat(
        &self,
        model: &str,
        prompt: &str,
        image_base64: Option<String>,
    ) -> Result<String, LlmError> {
        let mut content = vec![ChatContent::Text {
            text: prompt.to_string(),
        }];
        if let Some(data) = image_base64 {
            content.push(ChatContent::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/jpeg;base64,{}", data),
                },
            });
        }

        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: vec![ChatContent::Text {
                        text: SYSTEM_PROMPT.to_string(),
                    }],
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Empty completion response".to_string()))
    }

    /// Call Ollama's chat endpoint in JSON mode.
    async fn call_ollama(
        &self,
        model: &str,
        prompt: &str,
        image_base64: Option<String>,
    ) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: model.to_string(),
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                    images: Vec::new(),
                },
                OllamaMessage {
                    role: "user",
                    content: prompt.to_string(),
                    images: image_base64.into_iter().collect(),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.message.content)
    }
}

/// Map a non-success HTTP status to the matching error kind.
fn status_error(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::Unauthorized(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => LlmError::QuotaExceeded(body),
        _ => LlmError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

/// Truncate to at most `max_chars` characters (UTF-8 safe).
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Parse a model reply into structured fields.
///
/// Tolerates markdown code fences and prose around the JSON object. A reply
/// whose fields are all null or blank is rejected as an empty analysis.
pub fn parse_structured_reply(reply: &str) -> Result<StructuredInfo, LlmError> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let json_slice = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if end > start => &unfenced[start..=end],
        _ => {
            return Err(LlmError::Parse(
                "No JSON object in model reply".to_string(),
            ))
        }
    };

    let value: serde_json::Value =
        serde_json::from_str(json_slice).map_err(|e| LlmError::Parse(e.to_string()))?;
    let info = StructuredInfo::from_json(value)
        .ok_or_else(|| LlmError::Parse("Model reply is not a JSON object".to_string()))?;
    if info.iter().all(|(_, value)| value.is_empty()) {
        return Err(LlmError::Parse("empty analysis".to_string()));
    }
    Ok(info)
}
