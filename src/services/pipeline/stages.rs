//! Collaborator seams used by the extraction pipeline.
//!
//! Each stage is a blocking operation; the pipeline runs them off the async
//! runtime. Default implementations wrap the local tooling in `utils`, `ocr`
//! and `images`.

use std::path::Path;

use image::DynamicImage;

use crate::images::{DocumentImageExtractor, ImageError};
use crate::models::DocumentType;
use crate::ocr::{ExtractionError, NativeTextExtractor, OcrBackend, OcrError, TesseractBackend};
use crate::utils::{detect_document_type, DetectError};

/// Classifies a file as pdf, docx, image or unknown.
pub trait TypeDetector: Send + Sync {
    fn detect_type(&self, path: &Path) -> Result<DocumentType, DetectError>;
}

/// Reads embedded text layers. Returns an empty string when there are none.
pub trait TextExtractor: Send + Sync {
    fn extract_native_text(&self, path: &Path, doc_type: DocumentType) -> Result<String, ExtractionError>;
}

/// Recognises text in raster content. Textless input yields an empty string.
pub trait OcrEngine: Send + Sync {
    fn run_ocr(&self, path: &Path, doc_type: DocumentType) -> Result<String, OcrError>;
}

/// Pulls the ordered embedded raster images out of a document.
pub trait ImageExtractor: Send + Sync {
    fn extract_images(&self, path: &Path, doc_type: DocumentType) -> Result<Vec<DynamicImage>, ImageError>;
}

/// Detection by file signature.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeDetector;

impl TypeDetector for ContentTypeDetector {
    fn detect_type(&self, path: &Path) -> Result<DocumentType, DetectError> {
        detect_document_type(path)
    }
}

impl TextExtractor for NativeTextExtractor {
    fn extract_native_text(&self, path: &Path, doc_type: DocumentType) -> Result<String, ExtractionError> {
        self.extract(path, doc_type)
    }
}

impl OcrEngine for TesseractBackend {
    fn run_ocr(&self, path: &Path, doc_type: DocumentType) -> Result<String, OcrError> {
        self.ocr_document(path, doc_type)
    }
}

impl ImageExtractor for DocumentImageExtractor {
    fn extract_images(&self, path: &Path, doc_type: DocumentType) -> Result<Vec<DynamicImage>, ImageError> {
        self.extract(path, doc_type)
    }
}
