//! Content analysis backends.
//!
//! A [`ContentAnalyzer`] turns document text or a face image into structured
//! fields. Failures are reported as [`AnalysisOutcome::Unavailable`] rather
//! than errors: the pipeline must never fail because an analyzer did.

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmConfig, LlmError};
use crate::models::{StructuredAnalysis, StructuredInfo};

/// Result of one analyzer call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The analyzer returned usable structure.
    Completed(StructuredInfo),
    /// The analyzer could not be reached or its reply was unusable.
    Unavailable {
        reason: String,
        partial: Option<StructuredInfo>,
    },
}

impl AnalysisOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            partial: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn into_analysis(self) -> StructuredAnalysis {
        match self {
            Self::Completed(info) => StructuredAnalysis::succeeded(info),
            Self::Unavailable { reason, partial } => StructuredAnalysis::unavailable(reason, partial),
        }
    }
}

/// Something that can extract structured fields from text and images.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Analyzer name for logging and status output.
    fn name(&self) -> &str;

    /// Whether calls are expected to reach a backend.
    fn is_available(&self) -> bool;

    /// Extract fields from document text.
    async fn analyze_text(&self, text: &str) -> AnalysisOutcome;

    /// Extract fields from a JPEG-encoded face image.
    async fn analyze_image(&self, jpeg: &[u8]) -> AnalysisOutcome;
}

/// Analyzer backed by an OpenAI-compatible or Ollama LLM.
pub struct LlmAnalyzer {
    client: LlmClient,
}

impl LlmAnalyzer {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: LlmClient::new(config)?,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        self.client.config()
    }

    fn outcome(&self, result: Result<StructuredInfo, LlmError>, what: &str) -> AnalysisOutcome {
        match result {
            Ok(info) => AnalysisOutcome::Completed(info),
            Err(e) => {
                tracing::warn!(
                    "{} {} analysis unavailable: {}",
                    self.client.config().provider_name(),
                    what,
                    e
                );
                AnalysisOutcome::unavailable(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ContentAnalyzer for LlmAnalyzer {
    fn name(&self) -> &str {
        self.client.config().provider_name()
    }

    fn is_available(&self) -> bool {
        self.client.config().is_configured()
    }

    async fn analyze_text(&self, text: &str) -> AnalysisOutcome {
        let result = self.client.analyze_text(text).await;
        self.outcome(result, "text")
    }

    async fn analyze_image(&self, jpeg: &[u8]) -> AnalysisOutcome {
        let result = self.client.analyze_image(jpeg).await;
        self.outcome(result, "image")
    }
}

/// Analyzer used when no remote backend is configured.
#[derive(Debug, Clone, Default)]
pub struct OfflineAnalyzer;

const OFFLINE_REASON: &str = "no analyzer configured";

#[async_trait]
impl ContentAnalyzer for OfflineAnalyzer {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn analyze_text(&self, _text: &str) -> AnalysisOutcome {
        AnalysisOutcome::unavailable(OFFLINE_REASON)
    }

    async fn analyze_image(&self, _jpeg: &[u8]) -> AnalysisOutcome {
        AnalysisOutcome::unavailable(OFFLINE_REASON)
    }
}
