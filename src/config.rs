//! Configuration management for docphoto using the prefer crate.
//!
//! A config file (toml, yaml or json) is discovered by prefer or passed
//! explicitly. Its values are resolved into an immutable [`Settings`] that is
//! handed to the pipeline, the CLI and the web server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::utils::file_extension;

/// Default upload limit (16 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "docx", "doc"];
const DEFAULT_BATCH_EXTENSIONS: &[&str] = &["pdf", "docx", "jpg", "jpeg", "png", "tif", "tiff", "bmp"];

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

/// OCR settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Run OCR when native text is missing or short.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tesseract language (e.g. "eng", "deu+eng").
    #[serde(default = "default_ocr_language")]
    pub language: String,
    /// Maximum PDF pages to rasterize.
    #[serde(default = "default_ocr_max_pages")]
    pub max_pages: u32,
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_ocr_max_pages() -> u32 {
    10
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            language: default_ocr_language(),
            max_pages: default_ocr_max_pages(),
        }
    }
}

/// Face detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Detector command. Must print one `x y w h` box per line.
    #[serde(default = "default_face_command")]
    pub command: String,
    /// Arguments; `{file}` is replaced with the image path.
    #[serde(default = "default_face_args")]
    pub args: Vec<String>,
    /// Smallest face edge in pixels.
    #[serde(default = "default_face_min_size")]
    pub min_size: u32,
    /// Padding around each box as a fraction of its size.
    #[serde(default = "default_face_margin")]
    pub margin: f32,
}

fn default_face_command() -> String {
    "facedetect".to_string()
}

fn default_face_args() -> Vec<String> {
    vec!["{file}".to_string()]
}

fn default_face_min_size() -> u32 {
    30
}

fn default_face_margin() -> f32 {
    0.2
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_face_command(),
            args: default_face_args(),
            min_size: default_face_min_size(),
            margin: default_face_margin(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Extensions accepted by the web upload form.
    pub allowed_extensions: Vec<String>,
    /// Extensions picked up by batch mode.
    pub batch_extensions: Vec<String>,
    /// Directory for temporary uploads.
    pub upload_dir: PathBuf,
    /// Default output directory for batch runs.
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub llm: LlmConfig,
    pub ocr: OcrSettings,
    pub faces: FaceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allowed_extensions: to_strings(DEFAULT_ALLOWED_EXTENSIONS),
            batch_extensions: to_strings(DEFAULT_BATCH_EXTENSIONS),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("extracted_data"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            llm: LlmConfig::default(),
            ocr: OcrSettings::default(),
            faces: FaceSettings::default(),
        }
    }
}

impl Settings {
    /// Whether an uploaded filename has an allowed extension (case-insensitive).
    pub fn is_allowed(&self, filename: &str) -> bool {
        has_extension_in(filename, &self.allowed_extensions)
    }

    /// Whether a file should be picked up by batch mode.
    pub fn is_batch_candidate(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| has_extension_in(name, &self.batch_extensions))
    }

    /// Create the upload directory if missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
    }
}

fn has_extension_in(filename: &str, extensions: &[String]) -> bool {
    file_extension(filename).is_some_and(|ext| {
        extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    })
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Upload limit in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
    /// LLM configuration for structured analysis.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub faces: FaceSettings,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no docphoto config file exists.
    pub async fn load() -> Self {
        match prefer::load("docphoto").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension: toml, yaml/yml, anything else json.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Resolve this config into runtime settings.
    ///
    /// Relative directories stay relative to the working directory unless
    /// they came from a config file, in which case they resolve against it.
    pub fn into_settings(self) -> Settings {
        let mut settings = Settings::default();
        let base_dir = self.base_dir();
        let resolve = |value: &str| match base_dir {
            Some(ref dir) => self.resolve_path(value, dir),
            None => PathBuf::from(shellexpand::tilde(value).as_ref()),
        };

        if let Some(ref dir) = self.upload_dir {
            settings.upload_dir = resolve(dir);
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = resolve(dir);
        }
        if let Some(ref exts) = self.allowed_extensions {
            settings.allowed_extensions = normalize_extensions(exts);
        }
        if let Some(ref exts) = self.batch_extensions {
            settings.batch_extensions = normalize_extensions(exts);
        }
        if let Some(limit) = self.max_upload_bytes {
            settings.max_upload_bytes = limit;
        }

        settings.llm = self.llm.clone().with_env_overrides();
        settings.ocr = self.ocr.clone();
        settings.faces = self.faces.clone();
        settings
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Load settings from an explicit config file or by discovery.
pub async fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path)
            .await
            .map_err(anyhow::Error::msg)?,
        None => Config::load().await,
    };

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    Ok(config.into_settings())
}
