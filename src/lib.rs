//! docphoto - face photo and personal information extraction from identity
//! documents.
//!
//! Documents (PDF, DOCX or images) go through type detection, native text
//! extraction with OCR fallback, embedded image extraction and face
//! detection. Recovered text, or the first face when text is not enough, is
//! sent to an LLM for structured field extraction.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod images;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod server;
pub mod services;
pub mod utils;
