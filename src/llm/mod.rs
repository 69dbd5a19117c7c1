//! LLM integration for structured extraction from document text and face images.

mod client;

pub use client::{
    parse_structured_reply, LlmClient, LlmConfig, LlmError, LlmProvider, DEFAULT_IMAGE_PROMPT,
    DEFAULT_TEXT_PROMPT, SYSTEM_PROMPT,
};
