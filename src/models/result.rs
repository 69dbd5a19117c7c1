//! The processing result returned for every pipeline invocation.

use serde::{Deserialize, Serialize};

use super::{DocumentType, StructuredAnalysis};

/// Outcome of processing one document.
///
/// `face_count` always equals `face_images.len()`; both constructors keep that
/// invariant, including the failure shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_info: Option<StructuredAnalysis>,
    pub face_count: usize,
    /// Base64-encoded JPEG face crops, in detection order.
    pub face_images: Vec<String>,
}

impl ProcessingResult {
    /// A completed (possibly degraded) result.
    pub fn completed(
        document_type: DocumentType,
        extracted_info: StructuredAnalysis,
        face_images: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            error: None,
            document_type: Some(document_type),
            extracted_info: Some(extracted_info),
            face_count: face_images.len(),
            face_images,
        }
    }

    /// A fatal failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            document_type: None,
            extracted_info: None,
            face_count: 0,
            face_images: Vec::new(),
        }
    }

    /// Whether the remote analyzer was reported available.
    pub fn api_available(&self) -> bool {
        self.extracted_info
            .as_ref()
            .is_some_and(|info| info.api_available)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
