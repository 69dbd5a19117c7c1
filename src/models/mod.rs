//! Data models for document processing results.

mod document;
mod result;
mod structured;

pub use document::DocumentType;
pub use result::ProcessingResult;
pub use structured::{
    AnalysisStatus, FieldValue, StructuredAnalysis, StructuredInfo, PERSONAL_INFO_KEY,
};
