//! Shared helper functions for CLI commands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::config::Settings;
use crate::models::{FieldValue, ProcessingResult, StructuredInfo};
use crate::utils::{sanitize_filename, title_case_key};

/// Filesystem-safe stem of an input file, used to name outputs.
pub fn output_stem(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_filename)
        .unwrap_or_default();
    if stem.is_empty() {
        "document".to_string()
    } else {
        stem
    }
}

/// Settings for one run, with the LLM key replaced when `--api-key` was given.
pub fn settings_with_api_key(settings: &Settings, api_key: Option<String>) -> Settings {
    let mut settings = settings.clone();
    if let Some(key) = api_key {
        settings.llm = settings.llm.with_api_key(key);
    }
    settings
}

/// `extracted_<stem>` next to the input file.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("extracted_{}", output_stem(input)))
}

/// Write the result as pretty JSON to `<out_dir>/<stem>_result.json`.
pub fn save_result_json(
    result: &ProcessingResult,
    out_dir: &Path,
    stem: &str,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{}_result.json", stem));
    std::fs::write(&path, result.to_json_pretty()?)?;
    Ok(path)
}

/// Decode face images into `<out_dir>/faces/face_<n>.jpg` (1-based).
pub fn save_faces(result: &ProcessingResult, out_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if result.face_images.is_empty() {
        return Ok(Vec::new());
    }

    let faces_dir = out_dir.join("faces");
    std::fs::create_dir_all(&faces_dir)?;

    let mut saved = Vec::with_capacity(result.face_images.len());
    for (i, encoded) in result.face_images.iter().enumerate() {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let path = faces_dir.join(format!("face_{}.jpg", i + 1));
        std::fs::write(&path, bytes)?;
        saved.push(path);
    }
    Ok(saved)
}

/// Render structured fields as an indented, human-readable outline.
///
/// Keys are title-cased, nested maps are indented, lists are bulleted and
/// empty values are skipped.
pub fn render_structured_info(info: &StructuredInfo) -> String {
    let mut out = String::new();
    render_map(&mut out, info, 0);
    out
}

fn render_map(out: &mut String, info: &StructuredInfo, indent: usize) {
    for (key, value) in info.iter() {
        if value.is_empty() {
            continue;
        }
        let pad = " ".repeat(indent);
        let label = title_case_key(key);
        match value {
            FieldValue::Text(text) => {
                let _ = writeln!(out, "{}{}: {}", pad, label, text.trim());
            }
            FieldValue::List(items) => {
                let _ = writeln!(out, "{}{}:", pad, label);
                render_list(out, items, indent + 2);
            }
            FieldValue::Map(nested) => {
                let _ = writeln!(out, "{}{}:", pad, label);
                render_map(out, nested, indent + 2);
            }
        }
    }
}

fn render_list(out: &mut String, items: &[FieldValue], indent: usize) {
    let pad = " ".repeat(indent);
    for item in items.iter().filter(|item| !item.is_empty()) {
        match item {
            FieldValue::Text(text) => {
                let _ = writeln!(out, "{}- {}", pad, text.trim());
            }
            FieldValue::List(nested) => render_list(out, nested, indent + 2),
            FieldValue::Map(nested) => {
                let _ = writeln!(out, "{}-", pad);
                render_map(out, nested, indent + 2);
            }
        }
    }
}
