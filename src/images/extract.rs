//! Embedded raster image extraction.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use tempfile::TempDir;
use thiserror::Error;

use crate::models::DocumentType;
use crate::ocr::tools::{check_cmd_status, ToolError, PDFIMAGES_NOT_FOUND};

/// Errors from image extraction.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid DOCX container: {0}")]
    InvalidDocx(String),

    #[error("{0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pulls the ordered set of raster images out of a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentImageExtractor;

impl DocumentImageExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract images in document order.
    ///
    /// - Image files decode to themselves.
    /// - PDFs are unpacked with `pdfimages` (output index order = page order).
    /// - DOCX media parts are read in `imageN` order.
    pub fn extract(&self, path: &Path, doc_type: DocumentType) -> Result<Vec<DynamicImage>, ImageError> {
        match doc_type {
            DocumentType::Image => {
                let bytes = std::fs::read(path)?;
                match image::load_from_memory(&bytes) {
                    Ok(img) => Ok(vec![img]),
                    Err(image::ImageError::Unsupported(e)) => {
                        tracing::warn!("Cannot decode {}: {}", path.display(), e);
                        Ok(Vec::new())
                    }
                    Err(e) => Err(ImageError::Decode(e)),
                }
            }
            DocumentType::Pdf => self.extract_pdf_images(path),
            DocumentType::Docx => {
                let bytes = std::fs::read(path)?;
                docx_images(&bytes)
            }
            DocumentType::Unknown => Ok(Vec::new()),
        }
    }

    fn extract_pdf_images(&self, path: &Path) -> Result<Vec<DynamicImage>, ImageError> {
        let temp_dir = TempDir::new()?;
        let prefix = temp_dir.path().join("img");

        let status = Command::new("pdfimages")
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .status();

        match check_cmd_status(status, PDFIMAGES_NOT_FOUND, "pdfimages failed to extract images") {
            Ok(()) => {}
            Err(ToolError::NotFound(hint)) => {
                tracing::warn!("{}, skipping embedded PDF images", hint);
                return Ok(Vec::new());
            }
            Err(ToolError::Failed(msg)) => return Err(ImageError::Tool(msg)),
            Err(ToolError::Io(e)) => return Err(ImageError::Io(e)),
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(temp_dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort_by_cached_key(|p| numbered_name_key(&p.to_string_lossy()));

        let mut images = Vec::with_capacity(files.len());
        for file in files {
            match image::open(&file) {
                Ok(img) => images.push(img),
                Err(e) => tracing::debug!("Skipping {}: {}", file.display(), e),
            }
        }
        Ok(images)
    }
}

/// Decode every raster image under `word/media/` in a DOCX container.
///
/// Vector formats (emf, wmf) and anything else the decoder rejects are skipped.
pub fn docx_images(bytes: &[u8]) -> Result<Vec<DynamicImage>, ImageError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ImageError::InvalidDocx(e.to_string()))?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("word/media/"))
        .map(str::to_string)
        .collect();
    names.sort_by_cached_key(|name| numbered_name_key(name));

    let mut images = Vec::with_capacity(names.len());
    for name in names {
        let mut data = Vec::new();
        archive
            .by_name(&name)
            .map_err(|e| ImageError::InvalidDocx(format!("{}: {}", name, e)))?
            .read_to_end(&mut data)?;

        match image::load_from_memory(&data) {
            Ok(img) => images.push(img),
            Err(e) => tracing::debug!("Skipping {}: {}", name, e),
        }
    }
    Ok(images)
}

/// Sort key putting `img-999.png` before `img-1000.png` and `image2.png`
/// before `image10.png`. Names without a trailing number sort last.
fn numbered_name_key(name: &str) -> (u64, String) {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let digits_at = stem
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let index = stem[digits_at..].parse().unwrap_or(u64::MAX);
    (index, name.to_string())
}
