//! Service layer for document processing.
//!
//! Domain logic separated from UI concerns, shared by the CLI and the web
//! server.

pub mod pipeline;

pub use pipeline::{
    ContentTypeDetector, ImageExtractor, OcrEngine, Pipeline, PipelineBuilder, PipelineConfig,
    PipelineError, ProcessOptions, TextExtractor, TypeDetector, MIN_NATIVE_TEXT_CHARS,
};
