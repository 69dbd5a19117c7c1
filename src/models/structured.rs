//! Structured personal-information fields returned by the content analyzer.
//!
//! Analyzer replies are free-form JSON objects. They are normalised into a
//! small tagged union so that merging text-derived and image-derived fields
//! follows one explicit collision policy instead of an untyped map update.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Key under which analyzers report the core identity fields.
pub const PERSONAL_INFO_KEY: &str = "personal_info";

/// A single structured-info value.
///
/// Numbers and booleans from the analyzer are kept as text; `null` entries are
/// dropped during normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<FieldValue>),
    Map(StructuredInfo),
}

impl FieldValue {
    /// Normalise an arbitrary JSON value. Returns `None` for `null`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            Value::String(s) => Some(FieldValue::Text(s)),
            Value::Array(items) => Some(FieldValue::List(
                items.into_iter().filter_map(FieldValue::from_json).collect(),
            )),
            Value::Object(map) => Some(FieldValue::Map(StructuredInfo::from_map(map))),
        }
    }

    /// Whether the value carries no information (blank text, empty list or map).
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Map(info) => info.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&StructuredInfo> {
        match self {
            FieldValue::Map(info) => Some(info),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FieldValue::from_json(value).ok_or_else(|| serde::de::Error::custom("null field value"))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<StructuredInfo> for FieldValue {
    fn from(info: StructuredInfo) -> Self {
        FieldValue::Map(info)
    }
}

/// Field name to value mapping, ordered by key so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StructuredInfo(BTreeMap<String, FieldValue>);

impl StructuredInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object, dropping `null` entries.
    pub fn from_map(map: serde_json::Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .filter_map(|(k, v)| FieldValue::from_json(v).map(|v| (k, v)))
                .collect(),
        )
    }

    /// Build from any JSON value; only objects are accepted.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// True when a non-empty `personal_info` section is present.
    pub fn has_personal_info(&self) -> bool {
        self.get(PERSONAL_INFO_KEY)
            .is_some_and(|value| !value.is_empty())
    }

    /// Shallow merge: every top-level key in `other` replaces the existing entry.
    ///
    /// Image-derived fields are merged over text-derived fields with this, so the
    /// image analysis wins on collision.
    pub fn merge_overwrite(&mut self, other: StructuredInfo) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }
}

impl<'de> Deserialize<'de> for StructuredInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_map(map))
    }
}

impl FromIterator<(String, FieldValue)> for StructuredInfo {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for StructuredInfo {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Outcome of the remote analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// At least one analyzer call returned usable structure.
    Succeeded,
    /// Analysis was attempted but the analyzer was unreachable or unusable.
    Unavailable,
    /// No analysis was attempted (no text and no face fallback).
    NotAttempted,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Unavailable => "unavailable",
            Self::NotAttempted => "not_attempted",
        }
    }
}

/// Merged text and image analysis attached to a processing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    /// Whether the remote analyzer produced a result.
    ///
    /// Kept `true` for `NotAttempted` for compatibility with existing consumers;
    /// `analysis_status` carries the precise state.
    pub api_available: bool,
    pub analysis_status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_info: Option<StructuredInfo>,
    /// Why the analyzer was unavailable, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StructuredAnalysis {
    /// Analysis that was never attempted.
    pub fn not_attempted() -> Self {
        Self {
            api_available: true,
            analysis_status: AnalysisStatus::NotAttempted,
            structured_info: None,
            error: None,
        }
    }

    pub fn succeeded(info: StructuredInfo) -> Self {
        Self {
            api_available: true,
            analysis_status: AnalysisStatus::Succeeded,
            structured_info: Some(info),
            error: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>, partial: Option<StructuredInfo>) -> Self {
        Self {
            api_available: false,
            analysis_status: AnalysisStatus::Unavailable,
            structured_info: partial.filter(|info| !info.is_empty()),
            error: Some(reason.into()),
        }
    }

    /// True when `structured_info` is missing or lacks a usable personal-info section.
    pub fn lacks_personal_info(&self) -> bool {
        self.structured_info
            .as_ref()
            .map_or(true, |info| info.is_empty() || !info.has_personal_info())
    }

    /// Fold a successful image analysis into this one.
    pub fn merge_image_fields(&mut self, image_fields: StructuredInfo) {
        self.structured_info
            .get_or_insert_with(StructuredInfo::new)
            .merge_overwrite(image_fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_normalises_scalars() {
        let info = StructuredInfo::from_json(json!({
            "age": 42,
            "verified": true,
            "missing": null,
            "name": "Jane Doe"
        }))
        .unwrap();

        assert_eq!(info.len(), 3);
        assert_eq!(info.get("age").and_then(|v| v.as_text()), Some("42"));
        assert_eq!(info.get("verified").and_then(|v| v.as_text()), Some("true"));
        assert!(info.get("missing").is_none());
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(StructuredInfo::from_json(json!(["a", "b"])).is_none());
        assert!(StructuredInfo::from_json(json!("text")).is_none());
    }

    #[test]
    fn test_nested_values_round_trip_to_same_json() {
        let source = json!({
            "personal_info": {"full_name": "Jane Doe", "aliases": ["JD", "J. Doe"]},
            "document_info": {"number": "X1234567"}
        });
        let info = StructuredInfo::from_json(source.clone()).unwrap();
        assert_eq!(serde_json::to_value(&info).unwrap(), source);
    }

    #[test]
    fn test_has_personal_info() {
        let mut info = StructuredInfo::new();
        assert!(!info.has_personal_info());

        info.insert(PERSONAL_INFO_KEY, StructuredInfo::new());
        assert!(!info.has_personal_info());

        let mut personal = StructuredInfo::new();
        personal.insert("full_name", "Jane Doe");
        info.insert(PERSONAL_INFO_KEY, personal);
        assert!(info.has_personal_info());
    }

    #[test]
    fn test_merge_overwrite_prefers_incoming_fields() {
        let mut text = StructuredInfo::new();
        text.insert("name", "From Text");
        text.insert("address", "1 Main St");

        let mut image = StructuredInfo::new();
        image.insert("name", "From Image");
        image.insert("hair_color", "brown");

        text.merge_overwrite(image);

        assert_eq!(text.get("name").and_then(|v| v.as_text()), Some("From Image"));
        assert_eq!(text.get("address").and_then(|v| v.as_text()), Some("1 Main St"));
        assert_eq!(text.get("hair_color").and_then(|v| v.as_text()), Some("brown"));
    }

    #[test]
    fn test_lacks_personal_info() {
        assert!(StructuredAnalysis::not_attempted().lacks_personal_info());

        let mut info = StructuredInfo::new();
        info.insert("document_info", "passport");
        assert!(StructuredAnalysis::succeeded(info.clone()).lacks_personal_info());

        let mut personal = StructuredInfo::new();
        personal.insert("full_name", "Jane Doe");
        info.insert(PERSONAL_INFO_KEY, personal);
        assert!(!StructuredAnalysis::succeeded(info).lacks_personal_info());
    }

    #[test]
    fn test_unavailable_serialization() {
        let analysis = StructuredAnalysis::unavailable("quota exceeded", None);
        let json = serde_json::to_value(&analysis).unwrap();

        assert_eq!(json["api_available"], false);
        assert_eq!(json["analysis_status"], "unavailable");
        assert_eq!(json["error"], "quota exceeded");
        assert!(json.get("structured_info").is_none());
    }
}
