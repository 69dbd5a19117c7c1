//! Embedded image extraction and face cropping.

mod extract;
mod faces;

pub use extract::{docx_images, DocumentImageExtractor, ImageError};
pub use faces::{
    crop_face, encode_jpeg, parse_face_boxes, CommandFaceDetector, CropOptions, FaceBox,
    FaceDetector, FaceError,
};
