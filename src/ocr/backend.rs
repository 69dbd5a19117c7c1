//! OCR backend abstraction.

use std::path::Path;
use std::time::Instant;

use tempfile::TempDir;
use thiserror::Error;

use super::pdf_utils;
use crate::models::DocumentType;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content.
    pub text: String,
    /// Which backend produced this result.
    pub backend: OcrBackendType,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Available OCR backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrBackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
}

impl OcrBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
        }
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for OCR backends.
pub trait OcrBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> OcrBackendType;

    /// Check if this backend is available (dependencies installed).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Core OCR: extract text from an image file.
    fn run_ocr(&self, image_path: &Path) -> Result<String, OcrError>;

    /// Maximum number of PDF pages to rasterize per document.
    fn max_pages(&self) -> u32 {
        10
    }

    /// Run OCR on an image file, returning a timed result.
    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = self.run_ocr(image_path)?;
        Ok(OcrResult {
            text,
            backend: self.backend_type(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run OCR on a specific page of a PDF file.
    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let temp_dir = TempDir::new()?;
        let image_path = pdf_utils::pdf_page_to_image(pdf_path, page, temp_dir.path())?;
        let text = self.run_ocr(&image_path)?;
        Ok(OcrResult {
            text,
            backend: self.backend_type(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// OCR a whole document.
    ///
    /// Images are recognised directly; PDFs are rasterized page by page up to
    /// `max_pages` and the non-empty page texts joined with a blank line. Other
    /// types have no raster content and yield an empty string.
    fn ocr_document(&self, path: &Path, doc_type: DocumentType) -> Result<String, OcrError> {
        match doc_type {
            DocumentType::Image => Ok(self.ocr_image(path)?.text.trim().to_string()),
            DocumentType::Pdf => {
                let pages = pdf_utils::pdf_page_count(path)
                    .unwrap_or(1)
                    .clamp(1, self.max_pages().max(1));
                let mut texts = Vec::with_capacity(pages as usize);
                for page in 1..=pages {
                    let result = self.ocr_pdf_page(path, page)?;
                    tracing::debug!(
                        "OCR page {}/{} via {} in {}ms",
                        page,
                        pages,
                        result.backend,
                        result.processing_time_ms
                    );
                    let text = result.text.trim();
                    if !text.is_empty() {
                        texts.push(text.to_string());
                    }
                }
                Ok(texts.join("\n\n"))
            }
            DocumentType::Docx | DocumentType::Unknown => Ok(String::new()),
        }
    }
}

/// Configuration for OCR backends.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// Language for OCR (e.g., "eng", "deu+eng").
    pub language: String,
    /// Maximum PDF pages to OCR.
    pub max_pages: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            max_pages: 10,
        }
    }
}
