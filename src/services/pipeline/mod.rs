//! The document extraction pipeline.
//!
//! One forward pass per document: detect type, extract native text, OCR when
//! the native text is too thin, extract images, detect faces, analyze text,
//! and fall back to analyzing the first face when the text gave no personal
//! information. Only extraction faults are fatal; analyzer trouble degrades
//! the result instead.

mod stages;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use stages::{ContentTypeDetector, ImageExtractor, OcrEngine, TextExtractor, TypeDetector};

use crate::analysis::{AnalysisOutcome, ContentAnalyzer, LlmAnalyzer, OfflineAnalyzer};
use crate::config::Settings;
use crate::images::{
    CommandFaceDetector, DocumentImageExtractor, FaceDetector, FaceError, ImageError,
};
use crate::llm::LlmError;
use crate::models::{AnalysisStatus, DocumentType, ProcessingResult, StructuredAnalysis};
use crate::ocr::{ExtractionError, NativeTextExtractor, OcrConfig, TesseractBackend};
use crate::utils::DetectError;

/// Native text shorter than this (in chars) is supplemented with OCR.
pub const MIN_NATIVE_TEXT_CHARS: usize = 50;

/// Fatal pipeline faults.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Detect(#[from] DetectError),

    #[error("Text extraction failed: {0}")]
    Text(#[from] ExtractionError),

    #[error("Image extraction failed: {0}")]
    Images(#[from] ImageError),

    #[error("{0}")]
    Faces(#[from] FaceError),

    #[error("Processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Process-wide pipeline settings, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Run OCR when native text is missing or short.
    pub ocr_enabled: bool,
    /// Run face detection at all. When false every document behaves as if
    /// `skip_faces` had been requested.
    pub face_detection_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            face_detection_enabled: true,
        }
    }
}

/// Per-document options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub skip_faces: bool,
}

/// Blocking extraction stages, shared with worker threads.
struct Stages {
    detector: Arc<dyn TypeDetector>,
    text: Arc<dyn TextExtractor>,
    ocr: Arc<dyn OcrEngine>,
    images: Arc<dyn ImageExtractor>,
    faces: Arc<dyn FaceDetector>,
}

/// Output of the blocking half of the pipeline.
struct Extracted {
    document_type: DocumentType,
    text: String,
    faces: Vec<Vec<u8>>,
}

/// Builder for [`Pipeline`]. Unset collaborators use the local tooling and
/// the offline analyzer.
pub struct PipelineBuilder {
    config: PipelineConfig,
    detector: Arc<dyn TypeDetector>,
    text: Arc<dyn TextExtractor>,
    ocr: Arc<dyn OcrEngine>,
    images: Arc<dyn ImageExtractor>,
    faces: Arc<dyn FaceDetector>,
    analyzer: Arc<dyn ContentAnalyzer>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            detector: Arc::new(ContentTypeDetector),
            text: Arc::new(NativeTextExtractor::new()),
            ocr: Arc::new(TesseractBackend::new()),
            images: Arc::new(DocumentImageExtractor::new()),
            faces: Arc::new(CommandFaceDetector::default()),
            analyzer: Arc::new(OfflineAnalyzer),
        }
    }

    pub fn type_detector(mut self, detector: Arc<dyn TypeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn text_extractor(mut self, text: Arc<dyn TextExtractor>) -> Self {
        self.text = text;
        self
    }

    pub fn ocr_engine(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn image_extractor(mut self, images: Arc<dyn ImageExtractor>) -> Self {
        self.images = images;
        self
    }

    pub fn face_detector(mut self, faces: Arc<dyn FaceDetector>) -> Self {
        self.faces = faces;
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            config: self.config,
            stages: Arc::new(Stages {
                detector: self.detector,
                text: self.text,
                ocr: self.ocr,
                images: self.images,
                faces: self.faces,
            }),
            analyzer: self.analyzer,
        }
    }
}

/// The extraction pipeline. Holds no per-document state, so one instance can
/// serve concurrent callers.
pub struct Pipeline {
    config: PipelineConfig,
    stages: Arc<Stages>,
    analyzer: Arc<dyn ContentAnalyzer>,
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Wire the default collaborators from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        let analyzer: Arc<dyn ContentAnalyzer> = if settings.llm.enabled {
            Arc::new(LlmAnalyzer::new(settings.llm.clone())?)
        } else {
            Arc::new(OfflineAnalyzer)
        };

        let ocr = TesseractBackend::with_config(OcrConfig {
            language: settings.ocr.language.clone(),
            max_pages: settings.ocr.max_pages,
        });
        let faces = CommandFaceDetector::from_settings(&settings.faces);

        Ok(Self::builder(PipelineConfig {
            ocr_enabled: settings.ocr.enabled,
            face_detection_enabled: settings.faces.enabled,
        })
        .ocr_engine(Arc::new(ocr))
        .face_detector(Arc::new(faces))
        .analyzer(analyzer)
        .build())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the configured analyzer.
    pub fn analyzer_name(&self) -> &str {
        self.analyzer.name()
    }

    /// Process one document. Never fails: faults become `success: false`.
    ///
    /// The input file is only read; deleting it is the caller's job.
    pub async fn process(&self, path: &Path, options: ProcessOptions) -> ProcessingResult {
        match self.run(path, options).await {
            Ok(result) => result,
            Err(e) => {
                error!("Processing {} failed: {}", path.display(), e);
                ProcessingResult::failed(e.to_string())
            }
        }
    }

    async fn run(&self, path: &Path, options: ProcessOptions) -> Result<ProcessingResult, PipelineError> {
        let skip_faces = options.skip_faces || !self.config.face_detection_enabled;
        let ocr_enabled = self.config.ocr_enabled;
        let stages = Arc::clone(&self.stages);
        let owned_path: PathBuf = path.to_path_buf();

        let extracted = tokio::task::spawn_blocking(move || {
            stages.extract(&owned_path, ocr_enabled, skip_faces)
        })
        .await??;

        let mut analysis = if has_text(&extracted.text) {
            debug!("Analyzing {} chars of text", extracted.text.chars().count());
            self.analyzer.analyze_text(&extracted.text).await.into_analysis()
        } else {
            debug!("No text recovered, skipping text analysis");
            StructuredAnalysis::not_attempted()
        };

        if !skip_faces && analysis.lacks_personal_info() {
            if let Some(first_face) = extracted.faces.first() {
                debug!(
                    "No personal info from text, analyzing first of {} faces",
                    extracted.faces.len()
                );
                let outcome = self.analyzer.analyze_image(first_face).await;
                apply_image_outcome(&mut analysis, outcome);
            }
        }

        if !analysis.api_available {
            warn!(
                "Analysis unavailable for {}: {}",
                path.display(),
                analysis.error.as_deref().unwrap_or("unknown reason")
            );
        }

        let face_images = extracted
            .faces
            .iter()
            .map(|face| base64::engine::general_purpose::STANDARD.encode(face))
            .collect::<Vec<_>>();

        info!(
            "Processed {} ({}, {} faces, analysis {})",
            path.display(),
            extracted.document_type,
            face_images.len(),
            analysis.analysis_status.as_str()
        );

        Ok(ProcessingResult::completed(
            extracted.document_type,
            analysis,
            face_images,
        ))
    }
}

impl Stages {
    fn extract(&self, path: &Path, ocr_enabled: bool, skip_faces: bool) -> Result<Extracted, PipelineError> {
        let document_type = self.detector.detect_type(path)?;
        debug!("Detected {} as {}", path.display(), document_type);

        let native = self.text.extract_native_text(path, document_type)?;
        debug!("Native text: {} chars", native.chars().count());

        let text = if ocr_enabled && needs_ocr(document_type, &native) {
            let ocr_text = match self.ocr.run_ocr(path, document_type) {
                Ok(text) => text,
                Err(e) => {
                    warn!("OCR failed for {}: {}", path.display(), e);
                    String::new()
                }
            };
            debug!("OCR text: {} chars", ocr_text.chars().count());
            merge_ocr_text(native, &ocr_text)
        } else {
            native
        };

        let images = self.images.extract_images(path, document_type)?;
        debug!("Extracted {} images", images.len());

        let mut faces = Vec::new();
        if !skip_faces {
            for image in &images {
                faces.extend(self.faces.detect_faces(image)?);
            }
            debug!("Detected {} faces", faces.len());
        }

        Ok(Extracted {
            document_type,
            text,
            faces,
        })
    }
}

/// OCR runs for raster-bearing types whose native text is empty or short.
pub fn needs_ocr(document_type: DocumentType, native_text: &str) -> bool {
    document_type.is_raster_bearing() && native_text.chars().count() < MIN_NATIVE_TEXT_CHARS
}

/// Append OCR text after native text with a blank line between them.
pub fn merge_ocr_text(native: String, ocr_text: &str) -> String {
    if ocr_text.is_empty() {
        native
    } else if native.is_empty() {
        ocr_text.to_string()
    } else {
        format!("{}\n\n{}", native, ocr_text)
    }
}

fn has_text(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Fold the face-image analysis into the text analysis.
///
/// Only a completed image analysis contributes fields, and they overwrite
/// text fields. `api_available` ends up true if either call succeeded; a
/// failed fallback after no text attempt is reported as unavailable.
fn apply_image_outcome(analysis: &mut StructuredAnalysis, outcome: AnalysisOutcome) {
    match outcome {
        AnalysisOutcome::Completed(info) => {
            analysis.merge_image_fields(info);
            analysis.api_available = true;
            analysis.analysis_status = AnalysisStatus::Succeeded;
            analysis.error = None;
        }
        AnalysisOutcome::Unavailable { reason, .. } => {
            debug!("Face analysis unavailable: {}", reason);
            if analysis.analysis_status == AnalysisStatus::NotAttempted {
                analysis.api_available = false;
                analysis.analysis_status = AnalysisStatus::Unavailable;
                analysis.error = Some(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::DynamicImage;

    use crate::models::{StructuredInfo, PERSONAL_INFO_KEY};
    use crate::ocr::OcrError;

    struct FixedType(Option<DocumentType>);

    impl TypeDetector for FixedType {
        fn detect_type(&self, _path: &Path) -> Result<DocumentType, DetectError> {
            self.0
                .ok_or_else(|| DetectError::Unrecognized("fixture.bin".to_string()))
        }
    }

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract_native_text(&self, _path: &Path, _doc_type: DocumentType) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    struct CountingOcr {
        text: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl CountingOcr {
        fn returning(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                text: Some(text),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                text: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OcrEngine for CountingOcr {
        fn run_ocr(&self, _path: &Path, _doc_type: DocumentType) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text
                .map(str::to_string)
                .ok_or_else(|| OcrError::BackendNotAvailable("tesseract".to_string()))
        }
    }

    struct BlankImages(usize);

    impl ImageExtractor for BlankImages {
        fn extract_images(&self, _path: &Path, _doc_type: DocumentType) -> Result<Vec<DynamicImage>, ImageError> {
            Ok((0..self.0).map(|_| DynamicImage::new_rgb8(8, 8)).collect())
        }
    }

    struct BrokenImages;

    impl ImageExtractor for BrokenImages {
        fn extract_images(&self, _path: &Path, _doc_type: DocumentType) -> Result<Vec<DynamicImage>, ImageError> {
            Err(ImageError::Tool("pdfimages failed: damaged xref".to_string()))
        }
    }

    /// Reports `per_image` faces per image, tagging each crop with a running index.
    struct NumberedFaces {
        per_image: usize,
        next: AtomicUsize,
    }

    impl NumberedFaces {
        fn new(per_image: usize) -> Arc<Self> {
            Arc::new(Self {
                per_image,
                next: AtomicUsize::new(0),
            })
        }
    }

    impl FaceDetector for NumberedFaces {
        fn name(&self) -> &str {
            "numbered"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn detect_faces(&self, _image: &DynamicImage) -> Result<Vec<Vec<u8>>, FaceError> {
            Ok((0..self.per_image)
                .map(|_| {
                    let n = self.next.fetch_add(1, Ordering::SeqCst) as u8;
                    vec![0xFF, 0xD8, n]
                })
                .collect())
        }
    }

    struct RecordingAnalyzer {
        text_reply: AnalysisOutcome,
        image_reply: AnalysisOutcome,
        texts: Mutex<Vec<String>>,
        images: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingAnalyzer {
        fn new(text_reply: AnalysisOutcome, image_reply: AnalysisOutcome) -> Arc<Self> {
            Arc::new(Self {
                text_reply,
                image_reply,
                texts: Mutex::new(Vec::new()),
                images: Mutex::new(Vec::new()),
            })
        }

        fn unreachable() -> Arc<Self> {
            Self::new(
                AnalysisOutcome::unavailable("Connection error: refused"),
                AnalysisOutcome::unavailable("Connection error: refused"),
            )
        }

        fn texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().clone()
        }

        fn images(&self) -> Vec<Vec<u8>> {
            self.images.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentAnalyzer for RecordingAnalyzer {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn analyze_text(&self, text: &str) -> AnalysisOutcome {
            self.texts.lock().unwrap().push(text.to_string());
            self.text_reply.clone()
        }

        async fn analyze_image(&self, jpeg: &[u8]) -> AnalysisOutcome {
            self.images.lock().unwrap().push(jpeg.to_vec());
            self.image_reply.clone()
        }
    }

    fn info(pairs: &[(&str, &str)]) -> StructuredInfo {
        let mut info = StructuredInfo::new();
        for (key, value) in pairs {
            info.insert(*key, *value);
        }
        info
    }

    fn with_personal_info(name: &str) -> StructuredInfo {
        let mut personal = StructuredInfo::new();
        personal.insert("full_name", name);
        let mut info = StructuredInfo::new();
        info.insert(PERSONAL_INFO_KEY, personal);
        info
    }

    fn pipeline(
        doc_type: DocumentType,
        native: &'static str,
        ocr: Arc<CountingOcr>,
        images: usize,
        faces: Arc<NumberedFaces>,
        analyzer: Arc<RecordingAnalyzer>,
    ) -> Pipeline {
        Pipeline::builder(PipelineConfig::default())
            .type_detector(Arc::new(FixedType(Some(doc_type))))
            .text_extractor(Arc::new(FixedText(native)))
            .ocr_engine(ocr)
            .image_extractor(Arc::new(BlankImages(images)))
            .face_detector(faces)
            .analyzer(analyzer)
            .build()
    }

    const LONG_TEXT: &str = "Passport of Jane Doe, number X1234567, born 01 Jan 1990 in Springfield";

    #[tokio::test]
    async fn test_face_count_matches_face_images() {
        for (images, per_image, skip_faces, expected) in
            [(0, 3, false, 0), (2, 3, false, 6), (1, 1, false, 1), (2, 3, true, 0)]
        {
            let p = pipeline(
                DocumentType::Pdf,
                LONG_TEXT,
                CountingOcr::returning(""),
                images,
                NumberedFaces::new(per_image),
                RecordingAnalyzer::unreachable(),
            );
            let result = p
                .process(Path::new("doc.pdf"), ProcessOptions { skip_faces })
                .await;
            assert!(result.success);
            assert_eq!(result.face_count, expected);
            assert_eq!(result.face_count, result.face_images.len());
        }
    }

    #[tokio::test]
    async fn test_faces_are_base64_in_detection_order() {
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            CountingOcr::returning(""),
            2,
            NumberedFaces::new(2),
            RecordingAnalyzer::new(
                AnalysisOutcome::Completed(with_personal_info("Jane")),
                AnalysisOutcome::unavailable("unused"),
            ),
        );
        let result = p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;

        let decoded: Vec<Vec<u8>> = result
            .face_images
            .iter()
            .map(|f| base64::engine::general_purpose::STANDARD.decode(f).unwrap())
            .collect();
        assert_eq!(
            decoded,
            vec![
                vec![0xFF, 0xD8, 0],
                vec![0xFF, 0xD8, 1],
                vec![0xFF, 0xD8, 2],
                vec![0xFF, 0xD8, 3]
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_analyzer_is_not_fatal() {
        let analyzer = RecordingAnalyzer::unreachable();
        let p = pipeline(
            DocumentType::Image,
            "",
            CountingOcr::returning("JANE DOE 1990-01-01 some more scanned characters here"),
            1,
            NumberedFaces::new(1),
            analyzer.clone(),
        );
        let result = p.process(Path::new("id.jpg"), ProcessOptions::default()).await;

        assert!(result.success);
        assert!(result.error.is_none());
        let info = result.extracted_info.unwrap();
        assert!(!info.api_available);
        assert_eq!(info.analysis_status, AnalysisStatus::Unavailable);
        assert_eq!(analyzer.texts().len(), 1);
        assert_eq!(analyzer.images().len(), 1);
    }

    #[tokio::test]
    async fn test_short_native_text_gets_ocr_appended() {
        let analyzer = RecordingAnalyzer::unreachable();
        let ocr = CountingOcr::returning("ABC");
        let p = pipeline(
            DocumentType::Image,
            "0123456789",
            ocr.clone(),
            0,
            NumberedFaces::new(0),
            analyzer.clone(),
        );
        p.process(Path::new("scan.png"), ProcessOptions::default()).await;

        assert_eq!(ocr.calls(), 1);
        assert_eq!(analyzer.texts(), vec!["0123456789\n\nABC".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_native_text_is_replaced_by_ocr() {
        let analyzer = RecordingAnalyzer::unreachable();
        let p = pipeline(
            DocumentType::Pdf,
            "",
            CountingOcr::returning("XYZ"),
            0,
            NumberedFaces::new(0),
            analyzer.clone(),
        );
        p.process(Path::new("scan.pdf"), ProcessOptions::default()).await;

        assert_eq!(analyzer.texts(), vec!["XYZ".to_string()]);
    }

    #[tokio::test]
    async fn test_ocr_skipped_for_long_text_and_docx() {
        let ocr = CountingOcr::returning("noise");
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            ocr.clone(),
            0,
            NumberedFaces::new(0),
            RecordingAnalyzer::unreachable(),
        );
        p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;
        assert_eq!(ocr.calls(), 0);

        let ocr = CountingOcr::returning("noise");
        let p = pipeline(
            DocumentType::Docx,
            "short",
            ocr.clone(),
            0,
            NumberedFaces::new(0),
            RecordingAnalyzer::unreachable(),
        );
        p.process(Path::new("cv.docx"), ProcessOptions::default()).await;
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_ocr_failure_degrades_to_native_text() {
        let analyzer = RecordingAnalyzer::unreachable();
        let ocr = CountingOcr::failing();
        let p = pipeline(
            DocumentType::Image,
            "short",
            ocr.clone(),
            0,
            NumberedFaces::new(0),
            analyzer.clone(),
        );
        let result = p.process(Path::new("id.png"), ProcessOptions::default()).await;

        assert!(result.success);
        assert_eq!(ocr.calls(), 1);
        assert_eq!(analyzer.texts(), vec!["short".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_faces_prevents_image_fallback() {
        let analyzer = RecordingAnalyzer::new(
            AnalysisOutcome::Completed(StructuredInfo::new()),
            AnalysisOutcome::Completed(with_personal_info("Jane")),
        );
        let p = pipeline(
            DocumentType::Image,
            "",
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(2),
            analyzer.clone(),
        );
        let result = p
            .process(Path::new("id.png"), ProcessOptions { skip_faces: true })
            .await;

        assert!(result.success);
        assert_eq!(result.face_count, 0);
        assert!(result.face_images.is_empty());
        assert!(analyzer.images().is_empty());
        let info = result.extracted_info.unwrap();
        assert_eq!(info.analysis_status, AnalysisStatus::NotAttempted);
    }

    #[tokio::test]
    async fn test_fallback_analyzes_only_first_face() {
        let analyzer = RecordingAnalyzer::new(
            AnalysisOutcome::Completed(info(&[("document_info", "passport")])),
            AnalysisOutcome::Completed(with_personal_info("Jane")),
        );
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(3),
            analyzer.clone(),
        );
        let result = p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;

        assert_eq!(result.face_count, 3);
        assert_eq!(analyzer.images(), vec![vec![0xFF, 0xD8, 0]]);
        let info = result.extracted_info.unwrap();
        assert!(info.api_available);
        assert_eq!(info.analysis_status, AnalysisStatus::Succeeded);
        let merged = info.structured_info.unwrap();
        assert!(merged.has_personal_info());
        assert!(merged.get("document_info").is_some());
    }

    #[tokio::test]
    async fn test_no_fallback_when_text_has_personal_info() {
        let analyzer = RecordingAnalyzer::new(
            AnalysisOutcome::Completed(with_personal_info("Jane")),
            AnalysisOutcome::Completed(with_personal_info("Other")),
        );
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(1),
            analyzer.clone(),
        );
        p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;
        assert!(analyzer.images().is_empty());
    }

    #[tokio::test]
    async fn test_image_fields_overwrite_text_fields() {
        let mut image_info = with_personal_info("From Image");
        image_info.insert("name", "Image Name");
        let analyzer = RecordingAnalyzer::new(
            AnalysisOutcome::Completed(info(&[("name", "Text Name"), ("address", "1 Main St")])),
            AnalysisOutcome::Completed(image_info),
        );
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(1),
            analyzer,
        );
        let result = p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;
        let merged = result.extracted_info.unwrap().structured_info.unwrap();

        assert_eq!(merged.get("name").and_then(|v| v.as_text()), Some("Image Name"));
        assert_eq!(merged.get("address").and_then(|v| v.as_text()), Some("1 Main St"));
        assert!(merged.has_personal_info());
    }

    #[tokio::test]
    async fn test_failed_fallback_keeps_text_analysis() {
        let analyzer = RecordingAnalyzer::new(
            AnalysisOutcome::Completed(info(&[("document_info", "passport")])),
            AnalysisOutcome::Unavailable {
                reason: "Quota exceeded".to_string(),
                partial: Some(info(&[("document_info", "from image")])),
            },
        );
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(1),
            analyzer.clone(),
        );
        let result = p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;

        assert_eq!(analyzer.images().len(), 1);
        let info = result.extracted_info.unwrap();
        assert!(info.api_available);
        assert_eq!(info.analysis_status, AnalysisStatus::Succeeded);
        assert!(info.error.is_none());
        let merged = info.structured_info.unwrap();
        assert_eq!(
            merged.get("document_info").and_then(|v| v.as_text()),
            Some("passport")
        );
        assert!(!merged.has_personal_info());
    }

    #[test]
    fn test_unavailable_image_outcome_merges_nothing() {
        let mut analysis = StructuredAnalysis::not_attempted();
        apply_image_outcome(
            &mut analysis,
            AnalysisOutcome::Unavailable {
                reason: "Quota exceeded".to_string(),
                partial: Some(with_personal_info("Partial")),
            },
        );

        assert!(!analysis.api_available);
        assert_eq!(analysis.analysis_status, AnalysisStatus::Unavailable);
        assert!(analysis.structured_info.is_none());
        assert_eq!(analysis.error.as_deref(), Some("Quota exceeded"));
    }

    #[tokio::test]
    async fn test_image_success_recovers_failed_text_analysis() {
        let analyzer = RecordingAnalyzer::new(
            AnalysisOutcome::unavailable("Quota exceeded"),
            AnalysisOutcome::Completed(with_personal_info("Jane")),
        );
        let p = pipeline(
            DocumentType::Pdf,
            LONG_TEXT,
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(1),
            analyzer,
        );
        let result = p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;
        let info = result.extracted_info.unwrap();

        assert!(info.api_available);
        assert_eq!(info.analysis_status, AnalysisStatus::Succeeded);
        assert!(info.error.is_none());
    }

    #[tokio::test]
    async fn test_no_text_and_no_faces_is_not_attempted() {
        let analyzer = RecordingAnalyzer::unreachable();
        let p = pipeline(
            DocumentType::Image,
            "",
            CountingOcr::returning("   "),
            1,
            NumberedFaces::new(0),
            analyzer.clone(),
        );
        let result = p.process(Path::new("blank.png"), ProcessOptions::default()).await;

        assert!(result.success);
        assert!(analyzer.texts().is_empty());
        let info = result.extracted_info.unwrap();
        assert!(info.api_available);
        assert_eq!(info.analysis_status, AnalysisStatus::NotAttempted);
        assert!(info.structured_info.is_none());
    }

    #[tokio::test]
    async fn test_failed_fallback_after_no_text_is_unavailable() {
        let p = pipeline(
            DocumentType::Image,
            "",
            CountingOcr::returning(""),
            1,
            NumberedFaces::new(1),
            RecordingAnalyzer::unreachable(),
        );
        let result = p.process(Path::new("photo.jpg"), ProcessOptions::default()).await;
        let info = result.extracted_info.unwrap();

        assert!(!info.api_available);
        assert_eq!(info.analysis_status, AnalysisStatus::Unavailable);
        assert_eq!(info.error.as_deref(), Some("Connection error: refused"));
    }

    #[tokio::test]
    async fn test_same_input_gives_identical_json() {
        let run = || async {
            let p = pipeline(
                DocumentType::Pdf,
                LONG_TEXT,
                CountingOcr::returning(""),
                2,
                NumberedFaces::new(2),
                RecordingAnalyzer::new(
                    AnalysisOutcome::Completed(info(&[("b", "2"), ("a", "1")])),
                    AnalysisOutcome::Completed(with_personal_info("Jane")),
                ),
            );
            p.process(Path::new("doc.pdf"), ProcessOptions::default())
                .await
                .to_json_pretty()
                .unwrap()
        };
        assert_eq!(run().await, run().await);
    }

    #[tokio::test]
    async fn test_detection_failure_is_fatal() {
        let p = Pipeline::builder(PipelineConfig::default())
            .type_detector(Arc::new(FixedType(None)))
            .analyzer(RecordingAnalyzer::unreachable())
            .build();
        let result = p.process(Path::new("fixture.bin"), ProcessOptions::default()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unrecognized"));
        assert_eq!(result.face_count, 0);
        assert!(result.face_images.is_empty());
    }

    #[tokio::test]
    async fn test_image_extraction_failure_is_fatal() {
        let p = Pipeline::builder(PipelineConfig::default())
            .type_detector(Arc::new(FixedType(Some(DocumentType::Pdf))))
            .text_extractor(Arc::new(FixedText(LONG_TEXT)))
            .image_extractor(Arc::new(BrokenImages))
            .analyzer(RecordingAnalyzer::unreachable())
            .build();
        let result = p.process(Path::new("doc.pdf"), ProcessOptions::default()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("damaged xref"));
    }

    #[tokio::test]
    async fn test_missing_file_with_default_stages() {
        let p = Pipeline::builder(PipelineConfig::default()).build();
        let result = p
            .process(Path::new("/nonexistent/docphoto/input.pdf"), ProcessOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Cannot read"));
    }

    #[tokio::test]
    async fn test_disabled_face_detection_acts_like_skip() {
        let analyzer = RecordingAnalyzer::unreachable();
        let p = Pipeline::builder(PipelineConfig {
            ocr_enabled: false,
            face_detection_enabled: false,
        })
        .type_detector(Arc::new(FixedType(Some(DocumentType::Image))))
        .text_extractor(Arc::new(FixedText("")))
        .image_extractor(Arc::new(BlankImages(1)))
        .face_detector(NumberedFaces::new(1))
        .analyzer(analyzer.clone())
        .build();
        let result = p.process(Path::new("id.png"), ProcessOptions::default()).await;

        assert_eq!(result.face_count, 0);
        assert!(analyzer.images().is_empty());
    }

    #[test]
    fn test_needs_ocr_threshold() {
        let just_short = "x".repeat(MIN_NATIVE_TEXT_CHARS - 1);
        let just_long = "x".repeat(MIN_NATIVE_TEXT_CHARS);
        assert!(needs_ocr(DocumentType::Pdf, ""));
        assert!(needs_ocr(DocumentType::Image, &just_short));
        assert!(!needs_ocr(DocumentType::Image, &just_long));
        assert!(!needs_ocr(DocumentType::Docx, ""));
        assert!(!needs_ocr(DocumentType::Unknown, ""));
    }

    #[test]
    fn test_merge_ocr_text() {
        assert_eq!(merge_ocr_text("native".to_string(), "ocr"), "native\n\nocr");
        assert_eq!(merge_ocr_text(String::new(), "ocr"), "ocr");
        assert_eq!(merge_ocr_text("native".to_string(), ""), "native");
    }
}
