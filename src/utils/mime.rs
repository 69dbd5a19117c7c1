//! Content-based document type detection.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;

use crate::models::DocumentType;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOCX_MAIN_PART: &str = "word/document.xml";

/// Errors from type detection. Always fatal for the pipeline.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecognized file format: {0}")]
    Unrecognized(String),
}

/// Classify a document by its content signature.
///
/// Reads the first 8KB for magic byte detection. Zip containers are opened to
/// confirm they hold a word-processing body before being called DOCX.
pub fn detect_document_type(path: &Path) -> Result<DocumentType, DetectError> {
    let io_err = |source| DetectError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut buffer = [0u8; 8192];
    let bytes_read = file.read(&mut buffer).map_err(io_err)?;

    if bytes_read == 0 {
        return Err(DetectError::Unrecognized(format!(
            "{} is empty",
            path.display()
        )));
    }

    let detected = infer::get(&buffer[..bytes_read]).ok_or_else(|| {
        DetectError::Unrecognized(format!("{} has no known signature", path.display()))
    })?;

    let doc_type = match detected.mime_type() {
        "application/pdf" => DocumentType::Pdf,
        DOCX_MIME => DocumentType::Docx,
        "application/zip" => {
            let bytes = std::fs::read(path).map_err(io_err)?;
            if zip_has_docx_body(&bytes) {
                DocumentType::Docx
            } else {
                DocumentType::Unknown
            }
        }
        mime if mime.starts_with("image/") => DocumentType::Image,
        other => {
            tracing::debug!("Unsupported signature {} for {}", other, path.display());
            DocumentType::Unknown
        }
    };

    Ok(doc_type)
}

/// Whether a zip archive contains the main DOCX document part.
fn zip_has_docx_body(bytes: &[u8]) -> bool {
    match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(mut archive) => archive.by_name(DOCX_MAIN_PART).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = zip::write::SimpleFileOptions::default();
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_detects_png_as_image() {
        let dir = TempDir::new().unwrap();
        let img: RgbImage = ImageBuffer::from_pixel(4, 4, Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let path = write_file(&dir, "scan.bin", &bytes);

        assert_eq!(detect_document_type(&path).unwrap(), DocumentType::Image);
    }

    #[test]
    fn test_detects_pdf_by_signature() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc", b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n");

        assert_eq!(detect_document_type(&path).unwrap(), DocumentType::Pdf);
    }

    #[test]
    fn test_detects_docx_container() {
        let dir = TempDir::new().unwrap();
        let bytes = zip_with(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", b"<w:document/>"),
        ]);
        let path = write_file(&dir, "resume.docx", &bytes);

        assert_eq!(detect_document_type(&path).unwrap(), DocumentType::Docx);
    }

    #[test]
    fn test_plain_zip_is_unknown() {
        let dir = TempDir::new().unwrap();
        let bytes = zip_with(&[("notes.txt", b"hello")]);
        let path = write_file(&dir, "archive.zip", &bytes);

        assert_eq!(detect_document_type(&path).unwrap(), DocumentType::Unknown);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = detect_document_type(&dir.path().join("nope.pdf"));
        assert!(matches!(result, Err(DetectError::Io { .. })));
    }

    #[test]
    fn test_empty_and_unsigned_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let empty = write_file(&dir, "empty.pdf", b"");
        let text = write_file(&dir, "notes.txt", b"just some plain text");

        assert!(matches!(
            detect_document_type(&empty),
            Err(DetectError::Unrecognized(_))
        ));
        assert!(matches!(
            detect_document_type(&text),
            Err(DetectError::Unrecognized(_))
        ));
    }
}
