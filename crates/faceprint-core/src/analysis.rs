//! Image decoding and the detector + recognizer pipeline behind [`FaceAnalyzer`].

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{RecognizerError, FaceRecognizer};
use crate::types::DetectedFace;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Decode JPEG/PNG bytes into an 8-bit RGB image.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Face detection + embedding model.
///
/// Implementations may keep mutable inference state, so callers own them
/// exclusively (the daemon runs one on a dedicated thread).
pub trait FaceAnalyzer: Send {
    /// Name reported to clients alongside embeddings.
    fn model_name(&self) -> &str;

    /// Find every face in `image`, each with a normalized embedding.
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError>;
}

/// SCRFD detection followed by ArcFace embedding of every detected face.
pub struct FaceAnalysis {
    name: String,
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl FaceAnalysis {
    pub fn new(name: impl Into<String>, detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self {
            name: name.into(),
            detector,
            recognizer,
        }
    }
}

impl FaceAnalyzer for FaceAnalysis {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError> {
        let boxes = self.detector.detect(image)?;

        boxes
            .into_iter()
            .map(|bbox| {
                let embedding = self.recognizer.extract(image, &bbox)?;
                Ok::<_, AnalysisError>(DetectedFace {
                    bbox,
                    embedding: Some(embedding),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn encode(format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 6, Rgb([10, 200, 30]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = decode_rgb(&encode(ImageFormat::Png)).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(3, 3), &Rgb([10, 200, 30]));
    }

    #[test]
    fn test_decode_jpeg() {
        let img = decode_rgb(&encode(ImageFormat::Jpeg)).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(decode_rgb(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_rgb(b"definitely not an image"), Err(DecodeError::Image(_))));
    }
}
