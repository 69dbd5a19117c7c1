//! Shared utility functions.
//!
//! - `mime`: content-based document type detection
//! - `format`: human-readable formatting and filename handling

mod format;
mod mime;

pub use format::{file_extension, format_size, sanitize_filename, title_case_key};
pub use mime::{detect_document_type, DetectError};
