//! Askama template structs for the web interface.
//!
//! Each struct corresponds to an HTML template in the templates/ directory.

use askama::Template;

use crate::models::{FieldValue, ProcessingResult, StructuredInfo};
use crate::utils::title_case_key;

/// One rendered line of structured info.
pub struct InfoLine {
    pub depth: usize,
    pub label: String,
    /// None for section headings.
    pub value: Option<String>,
}

/// Upload form.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub error: Option<String>,
    pub allowed_extensions: String,
}

/// Processing result page.
#[derive(Template)]
#[template(path = "result.html")]
pub struct ResultTemplate {
    pub filename: String,
    pub success: bool,
    pub error: String,
    pub document_type: String,
    pub face_images: Vec<String>,
    pub api_available: bool,
    pub analysis_error: String,
    pub info_lines: Vec<InfoLine>,
}

impl ResultTemplate {
    pub fn new(filename: &str, result: &ProcessingResult) -> Self {
        let analysis = result.extracted_info.as_ref();
        Self {
            filename: filename.to_string(),
            success: result.success,
            error: result.error.clone().unwrap_or_default(),
            document_type: result
                .document_type
                .map(|t| t.to_string())
                .unwrap_or_default(),
            face_images: result.face_images.clone(),
            api_available: analysis.is_some_and(|a| a.api_available),
            analysis_error: analysis
                .and_then(|a| a.error.clone())
                .unwrap_or_default(),
            info_lines: analysis
                .and_then(|a| a.structured_info.as_ref())
                .map(info_lines)
                .unwrap_or_default(),
        }
    }
}

/// Flatten structured info into indented display lines, skipping empty values.
pub fn info_lines(info: &StructuredInfo) -> Vec<InfoLine> {
    let mut lines = Vec::new();
    push_map(&mut lines, info, 0);
    lines
}

fn push_map(lines: &mut Vec<InfoLine>, info: &StructuredInfo, depth: usize) {
    for (key, value) in info.iter().filter(|(_, v)| !v.is_empty()) {
        let label = title_case_key(key);
        match value {
            FieldValue::Text(text) => lines.push(InfoLine {
                depth,
                label,
                value: Some(text.trim().to_string()),
            }),
            FieldValue::List(items) => {
                if items.iter().all(|item| item.as_text().is_some()) {
                    let texts: Vec<&str> = items
                        .iter()
                        .filter_map(|item| item.as_text())
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .collect();
                    lines.push(InfoLine {
                        depth,
                        label,
                        value: Some(texts.join(", ")),
                    });
                } else {
                    lines.push(InfoLine {
                        depth,
                        label,
                        value: None,
                    });
                    for nested in items.iter().filter_map(|item| item.as_map()) {
                        push_map(lines, nested, depth + 1);
                    }
                }
            }
            FieldValue::Map(nested) => {
                lines.push(InfoLine {
                    depth,
                    label,
                    value: None,
                });
                push_map(lines, nested, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_lines_flatten_sections() {
        let info = StructuredInfo::from_json(serde_json::json!({
            "personal_info": {"full_name": "Jane Doe", "aliases": ["JD", " ", "J. Doe"], "blank": ""},
            "addresses": [{"city": "Springfield"}]
        }))
        .unwrap();

        let lines = info_lines(&info);
        let rendered: Vec<(usize, &str, Option<&str>)> = lines
            .iter()
            .map(|l| (l.depth, l.label.as_str(), l.value.as_deref()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (0, "Addresses", None),
                (1, "City", Some("Springfield")),
                (0, "Personal Info", None),
                (1, "Aliases", Some("JD, J. Doe")),
                (1, "Full Name", Some("Jane Doe")),
            ]
        );
    }
}
