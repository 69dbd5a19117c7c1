//! Native text extraction from documents.
//!
//! PDFs go through pdftotext (Poppler); DOCX bodies are read straight out of
//! the zip container. Images have no text layer and yield an empty string.

use std::io::{Cursor, Read};
use std::path::Path;
use std::process::Command;

use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::tools::{handle_cmd_output, ToolError, PDFTOTEXT_NOT_FOUND};
use crate::models::DocumentType;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Invalid DOCX container: {0}")]
    InvalidDocx(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for ExtractionError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(tool) => ExtractionError::ToolNotFound(tool),
            ToolError::Failed(msg) => ExtractionError::ExtractionFailed(msg),
            ToolError::Io(e) => ExtractionError::Io(e),
        }
    }
}

/// Extracts embedded text layers without rendering.
#[derive(Debug, Clone, Default)]
pub struct NativeTextExtractor;

impl NativeTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract text for a document of the given type.
    ///
    /// A missing pdftotext binary is not an error here: the PDF is treated as
    /// having no text layer so OCR can still recover content.
    pub fn extract(&self, path: &Path, doc_type: DocumentType) -> Result<String, ExtractionError> {
        match doc_type {
            DocumentType::Pdf => match self.run_pdftotext(path) {
                Ok(text) => Ok(text.trim().to_string()),
                Err(ExtractionError::ToolNotFound(tool)) => {
                    tracing::warn!("{}, skipping native PDF text", tool);
                    Ok(String::new())
                }
                Err(e) => Err(e),
            },
            DocumentType::Docx => {
                let bytes = std::fs::read(path)?;
                docx_text(&bytes)
            }
            DocumentType::Image | DocumentType::Unknown => Ok(String::new()),
        }
    }

    /// Run pdftotext on a PDF file.
    fn run_pdftotext(&self, file_path: &Path) -> Result<String, ExtractionError> {
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(file_path)
            .arg("-") // Output to stdout
            .output();

        Ok(handle_cmd_output(
            output,
            PDFTOTEXT_NOT_FOUND,
            "pdftotext failed",
        )?)
    }
}

/// Extract the body text of a DOCX file.
pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::InvalidDocx(e.to_string()))?;

    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::InvalidDocx(format!("word/document.xml: {}", e)))?
        .read_to_end(&mut xml)?;

    docx_xml_to_text(&xml)
}

fn xml_error(e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::InvalidDocx(format!("word/document.xml: {}", e))
}

/// Collect run text from WordprocessingML.
///
/// `w:t` contents are kept verbatim, `w:tab` becomes a tab (tab stop
/// definitions under `w:tabs` are ignored), `w:br`/`w:cr` and paragraph ends
/// become newlines.
fn docx_xml_to_text(xml: &[u8]) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_reader(xml);
    let mut text = String::new();
    let mut in_run_text = false;
    let mut in_tab_stops = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = true,
                b"tabs" => in_tab_stops = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if !in_tab_stops => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => {
                text.push_str(&e.decode().map_err(xml_error)?);
            }
            Ok(Event::CData(e)) if in_run_text => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) if in_run_text => push_entity(&mut text, &e)?,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(xml_error(format!(
                    "parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string())
}

/// Resolve a character or predefined entity reference; unknown names are kept as written.
fn push_entity(text: &mut String, entity: &BytesRef) -> Result<(), ExtractionError> {
    if let Some(c) = entity.resolve_char_ref().map_err(xml_error)? {
        text.push(c);
        return Ok(());
    }

    let name = entity.decode().map_err(xml_error)?;
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(resolved) => text.push_str(resolved),
        None => {
            text.push('&');
            text.push_str(&name);
            text.push(';');
        }
    }
    Ok(())
}
