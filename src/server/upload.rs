//! Multipart upload handling.
//!
//! The uploaded document is written to a `NamedTempFile` in the upload
//! directory, so it is removed when the handler returns on any path.

use std::io::Write;
use std::path::Path;

use axum::extract::multipart::{Multipart, MultipartError};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::Settings;
use crate::utils::{file_extension, format_size, sanitize_filename};

/// Form field carrying the document.
pub const DOCUMENT_FIELD: &str = "document";

/// Reasons an upload is rejected before processing.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part")]
    NoFile,

    #[error("No file selected")]
    NoFilename,

    #[error("Invalid file type. Allowed types: {0}")]
    InvalidType(String),

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether the client is at fault (400) rather than the server (500).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Io(_))
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Malformed(err.body_text())
    }
}

/// Form field requesting that face detection be skipped.
pub const SKIP_FACES_FIELD: &str = "skip_faces";

/// A stored upload. The temp file is deleted on drop.
pub struct Upload {
    pub filename: String,
    pub file: NamedTempFile,
    pub skip_faces: bool,
}

impl Upload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Read the `document` field (and optional `skip_faces` flag), check the
/// extension and store the document.
pub async fn receive_upload(
    mut multipart: Multipart,
    settings: &Settings,
) -> Result<Upload, UploadError> {
    let mut stored: Option<(String, NamedTempFile)> = None;
    let mut skip_faces = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(DOCUMENT_FIELD) if stored.is_none() => {
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .unwrap_or_default();
                if filename.is_empty() {
                    return Err(UploadError::NoFilename);
                }
                if !settings.is_allowed(&filename) {
                    return Err(UploadError::InvalidType(settings.allowed_extensions.join(", ")));
                }

                let bytes = field.bytes().await?;
                let file = store_upload(&bytes, &filename, &settings.upload_dir)?;
                tracing::debug!(
                    "Stored upload {} ({})",
                    filename,
                    format_size(bytes.len() as u64)
                );
                stored = Some((filename, file));
            }
            Some(SKIP_FACES_FIELD) => {
                let value = field.text().await?;
                skip_faces = is_truthy(&value);
            }
            _ => {}
        }
    }

    let (filename, file) = stored.ok_or(UploadError::NoFile)?;
    Ok(Upload {
        filename,
        file,
        skip_faces,
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

fn store_upload(bytes: &[u8], filename: &str, upload_dir: &Path) -> std::io::Result<NamedTempFile> {
    std::fs::create_dir_all(upload_dir)?;
    let suffix = file_extension(filename)
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();

    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(upload_dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}
