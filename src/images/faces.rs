//! Face detection and cropping.
//!
//! Detection itself is delegated to an external command that prints one
//! `x y w h` bounding box per line (the output format of `facedetect`).
//! Cropping and JPEG encoding happen here.

use std::io::Cursor;
use std::process::Command;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::config::FaceSettings;
use crate::ocr::tools::check_binary;

/// Exit status `facedetect` uses to signal "no faces found".
const NO_FACES_EXIT_CODE: i32 = 2;

/// Errors from face detection.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    #[error("Image encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Detects faces in a decoded image and returns JPEG-encoded crops in detection order.
pub trait FaceDetector: Send + Sync {
    /// Detector name for status output.
    fn name(&self) -> &str;

    /// Whether the detector can run on this machine.
    fn is_available(&self) -> bool;

    fn detect_faces(&self, image: &DynamicImage) -> Result<Vec<Vec<u8>>, FaceError>;
}

/// A detected face bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Settings controlling how detected boxes become crops.
#[derive(Debug, Clone, PartialEq)]
pub struct CropOptions {
    /// Boxes narrower or shorter than this are ignored.
    pub min_size: u32,
    /// Fraction of the box size added on every side before cropping.
    pub margin: f32,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            min_size: 30,
            margin: 0.2,
        }
    }
}

/// Face detector backed by an external command.
///
/// `{file}` in the arguments is replaced with the path of a temporary PNG.
pub struct CommandFaceDetector {
    command: String,
    args: Vec<String>,
    crop: CropOptions,
}

impl CommandFaceDetector {
    pub fn new(command: impl Into<String>, args: Vec<String>, crop: CropOptions) -> Self {
        Self {
            command: command.into(),
            args,
            crop,
        }
    }

    /// Detector configured from the `[faces]` settings.
    pub fn from_settings(settings: &FaceSettings) -> Self {
        Self::new(
            settings.command.clone(),
            settings.args.clone(),
            CropOptions {
                min_size: settings.min_size,
                margin: settings.margin,
            },
        )
    }

    pub fn crop_options(&self) -> &CropOptions {
        &self.crop
    }

    fn expanded_args(&self, file: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{file}", file))
            .collect()
    }

    fn run_detector(&self, image: &DynamicImage) -> Result<Option<String>, FaceError> {
        let temp = tempfile::Builder::new()
            .prefix("docphoto-face-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(temp.path(), ImageFormat::Png)?;

        let file = temp.path().to_string_lossy().to_string();
        let output = Command::new(&self.command)
            .args(self.expanded_args(&file))
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
            }
            Ok(output) if output.status.code() == Some(NO_FACES_EXIT_CODE) => Ok(Some(String::new())),
            Ok(output) => Err(FaceError::DetectionFailed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Face detector '{}' not found, no faces will be extracted",
                    self.command
                );
                Ok(None)
            }
            Err(e) => Err(FaceError::Io(e)),
        }
    }
}

impl Default for CommandFaceDetector {
    fn default() -> Self {
        Self::new("facedetect", vec!["{file}".to_string()], CropOptions::default())
    }
}

impl FaceDetector for CommandFaceDetector {
    fn name(&self) -> &str {
        &self.command
    }

    fn is_available(&self) -> bool {
        check_binary(&self.command)
    }

    fn detect_faces(&self, image: &DynamicImage) -> Result<Vec<Vec<u8>>, FaceError> {
        let Some(stdout) = self.run_detector(image)? else {
            return Ok(Vec::new());
        };

        let boxes = parse_face_boxes(&stdout);
        tracing::debug!("Detector reported {} face boxes", boxes.len());

        boxes
            .into_iter()
            .filter(|b| b.width >= self.crop.min_size && b.height >= self.crop.min_size)
            .filter_map(|b| crop_face(image, b, self.crop.margin))
            .map(|crop| encode_jpeg(&crop))
            .collect()
    }
}

/// Parse `x y w h` lines; malformed lines are skipped.
pub fn parse_face_boxes(output: &str) -> Vec<FaceBox> {
    output
        .lines()
        .filter_map(|line| {
            let nums: Vec<u32> = line
                .split_whitespace()
                .map(|n| n.parse::<u32>())
                .collect::<Result<_, _>>()
                .ok()?;
            match nums.as_slice() {
                [x, y, w, h] if *w > 0 && *h > 0 => Some(FaceBox {
                    x: *x,
                    y: *y,
                    width: *w,
                    height: *h,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Crop a face with `margin` padding on each side, clamped to the image.
pub fn crop_face(image: &DynamicImage, face: FaceBox, margin: f32) -> Option<DynamicImage> {
    let (img_w, img_h) = (image.width(), image.height());
    if face.x >= img_w || face.y >= img_h {
        return None;
    }

    let pad_x = (face.width as f32 * margin.max(0.0)).round() as u32;
    let pad_y = (face.height as f32 * margin.max(0.0)).round() as u32;

    let left = face.x.saturating_sub(pad_x);
    let top = face.y.saturating_sub(pad_y);
    let right = face
        .x
        .saturating_add(face.width)
        .saturating_add(pad_x)
        .min(img_w);
    let bottom = face
        .y
        .saturating_add(face.height)
        .saturating_add(pad_y)
        .min(img_h);

    if right <= left || bottom <= top {
        return None;
    }

    Some(image.crop_imm(left, top, right - left, bottom - top))
}

/// Encode an image as JPEG, dropping any alpha channel.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, FaceError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(buf)
}
