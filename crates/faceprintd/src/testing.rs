//! Test doubles shared by the engine and HTTP tests.

use faceprint_core::{
    AnalysisError, BoundingBox, DetectedFace, DetectorError, Embedding, FaceAnalyzer, EMBEDDING_DIM,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Analyzer that reports a fixed set of faces for every image.
///
/// It can also be told to fail its first few calls, or to panic, which
/// takes the engine thread down with it.
pub struct StubAnalyzer {
    faces: Vec<DetectedFace>,
    failures_left: usize,
    panics: bool,
}

impl StubAnalyzer {
    pub fn new(faces: Vec<DetectedFace>) -> Self {
        Self {
            faces,
            failures_left: 0,
            panics: false,
        }
    }

    /// Return a detector error for the next `count` calls, then `faces`.
    pub fn failing(count: usize, faces: Vec<DetectedFace>) -> Self {
        Self {
            failures_left: count,
            ..Self::new(faces)
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::new(vec![])
        }
    }
}

impl FaceAnalyzer for StubAnalyzer {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn analyze(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError> {
        if self.panics {
            panic!("stub analyzer crashed");
        }
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(DetectorError::InferenceFailed("stub failure".into()).into());
        }
        Ok(self.faces.clone())
    }
}

/// A face of the given size whose embedding starts with `marker`.
pub fn face(width: f32, height: f32, marker: f32) -> DetectedFace {
    let mut values = vec![0.0; EMBEDDING_DIM];
    values[0] = marker;
    DetectedFace {
        bbox: BoundingBox {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
            confidence: 0.9,
            landmarks: None,
        },
        embedding: Some(Embedding {
            values,
            model_version: Some("stub".into()),
        }),
    }
}

/// Like [`face`] but without an embedding.
pub fn bare_face(width: f32, height: f32) -> DetectedFace {
    DetectedFace {
        embedding: None,
        ..face(width, height, 0.0)
    }
}

pub fn png_bytes() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(4, 4))
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}
