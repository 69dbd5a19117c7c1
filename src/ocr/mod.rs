//! OCR and text extraction module.
//!
//! Extracts text from documents using:
//! - pdftotext (Poppler) for PDF text layers
//! - the DOCX body part for word-processing files
//! - Tesseract OCR for images and scanned PDFs
//!
//! Native extraction and OCR are kept separate; the pipeline decides when OCR
//! is worth running.

mod backend;
mod extractor;
mod pdf_utils;
mod tesseract;
pub mod tools;

pub use backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
pub use extractor::{docx_text, ExtractionError, NativeTextExtractor};
pub use tesseract::TesseractBackend;
