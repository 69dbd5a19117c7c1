//! LLM client configuration.
//!
//! File settings are overridden by environment variables:
//! LLM_PROVIDER, LLM_ENDPOINT, LLM_MODEL, LLM_VISION_MODEL, LLM_API_KEY,
//! plus the provider-specific OPENAI_API_KEY and GROQ_API_KEY.

use serde::{Deserialize, Serialize};

use super::prompts::{DEFAULT_IMAGE_PROMPT, DEFAULT_TEXT_PROMPT};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    #[default]
    OpenAI,
    /// Ollama API (local)
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Endpoint and model defaults for a named provider.
fn provider_defaults(name: &str) -> Option<(&'static str, &'static str, &'static str)> {
    match name.to_lowercase().as_str() {
        "openai" => Some(("https://api.openai.com", "gpt-4o", "gpt-4o")),
        "groq" => Some((
            "https://api.groq.com/openai",
            "llama-3.3-70b-versatile",
            "meta-llama/llama-4-scout-17b-16e-instruct",
        )),
        "together" => Some((
            "https://api.together.xyz",
            "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
            "meta-llama/Llama-Vision-Free",
        )),
        "ollama" => Some(("http://localhost:11434", "llama3.1:8b", "llava:7b")),
        _ => None,
    }
}

/// Configuration for the analysis LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether remote analysis is enabled at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub provider: LlmProvider,
    /// API base URL (without the `/v1/...` path).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used for text analysis.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for face-image analysis; falls back to `model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    /// API key for OpenAI-compatible providers. Never written back to disk.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum characters of document text sent to the LLM.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Custom text prompt (uses the {content} placeholder).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_content_chars() -> usize {
    12000
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            vision_model: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
            timeout_secs: default_timeout_secs(),
            text_prompt: None,
            image_prompt: None,
        }
    }
}

impl LlmConfig {
    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit_provider = lookup("LLM_PROVIDER");
        let explicit_endpoint = lookup("LLM_ENDPOINT");
        let explicit_model = lookup("LLM_MODEL");

        if let Some(ref name) = explicit_provider {
            match LlmProvider::from_str(name) {
                Some(provider) => {
                    self.provider = provider;
                    if let Some((endpoint, model, vision)) = provider_defaults(name) {
                        self.endpoint = endpoint.to_string();
                        self.model = model.to_string();
                        self.vision_model = Some(vision.to_string());
                    }
                }
                None => tracing::warn!("Ignoring unknown LLM_PROVIDER '{}'", name),
            }
        }

        if let Some(key) = lookup("LLM_API_KEY") {
            self.api_key = Some(key);
        }

        if self.api_key.is_none() && self.provider == LlmProvider::OpenAI {
            let provider_name = explicit_provider
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_else(|| self.provider_name().to_lowercase());
            match provider_name.as_str() {
                "groq" => self.api_key = lookup("GROQ_API_KEY"),
                "openai" => self.api_key = lookup("OPENAI_API_KEY"),
                _ => {}
            }

            // No explicit provider: a Groq key alone is enough to switch over
            if self.api_key.is_none() && explicit_provider.is_none() {
                if let Some(key) = lookup("GROQ_API_KEY") {
                    self.api_key = Some(key);
                    if let Some((endpoint, model, vision)) = provider_defaults("groq") {
                        if explicit_endpoint.is_none() {
                            self.endpoint = endpoint.to_string();
                        }
                        self.model = model.to_string();
                        self.vision_model = Some(vision.to_string());
                    }
                }
            }
        }

        if let Some(endpoint) = explicit_endpoint {
            self.endpoint = endpoint;
        }
        if let Some(model) = explicit_model {
            self.model = model;
        }
        if let Some(vision) = lookup("LLM_VISION_MODEL") {
            self.vision_model = Some(vision);
        }

        self
    }

    /// Override the API key (e.g. from a command-line flag).
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Model used for image analysis.
    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.model)
    }

    pub fn text_prompt(&self) -> &str {
        self.text_prompt.as_deref().unwrap_or(DEFAULT_TEXT_PROMPT)
    }

    pub fn image_prompt(&self) -> &str {
        self.image_prompt.as_deref().unwrap_or(DEFAULT_IMAGE_PROMPT)
    }

    /// Whether enough is configured to attempt a request.
    pub fn is_configured(&self) -> bool {
        self.enabled && (self.provider == LlmProvider::Ollama || self.api_key.is_some())
    }

    /// Get the provider name for display.
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "Ollama",
            LlmProvider::OpenAI => {
                if self.endpoint.contains("groq.com") {
                    "Groq"
                } else if self.endpoint.contains("together.xyz") {
                    "Together"
                } else {
                    "OpenAI"
                }
            }
        }
    }

    /// Get a provider-aware availability hint for error messages.
    pub fn availability_hint(&self) -> String {
        if !self.enabled {
            return "LLM analysis is disabled in configuration".to_string();
        }
        match self.provider {
            LlmProvider::Ollama => format!(
                "Ollama not available at {}. Make sure Ollama is running: ollama serve",
                self.endpoint
            ),
            LlmProvider::OpenAI => {
                if self.api_key.is_none() {
                    format!(
                        "{} API key not set. Set LLM_API_KEY, OPENAI_API_KEY or GROQ_API_KEY, or pass --api-key",
                        self.provider_name()
                    )
                } else {
                    format!("{} API not available at {}", self.provider_name(), self.endpoint)
                }
            }
        }
    }
}
