//! faceprint-core — face selection and embedding comparison.
//!
//! Also hosts the model side: SCRFD detection and ArcFace recognition
//! running via ONNX Runtime, behind the [`FaceAnalyzer`] trait.

use std::path::PathBuf;

pub mod alignment;
pub mod analysis;
pub mod detector;
pub mod recognizer;
pub mod selection;
pub mod similarity;
pub mod types;

pub use analysis::{decode_rgb, AnalysisError, DecodeError, FaceAnalysis, FaceAnalyzer};
pub use detector::{DetectorError, FaceDetector};
pub use recognizer::{FaceRecognizer, RecognizerError};
pub use selection::{largest_face, SelectionError};
pub use similarity::{compare, l2_normalize, CompareError, Comparison, DEFAULT_MATCH_THRESHOLD};
pub use types::{BoundingBox, DetectedFace, Embedding, EMBEDDING_DIM};

/// SCRFD detector file inside an InsightFace model bundle.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognizer file inside an InsightFace model bundle.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Where InsightFace unpacks the buffalo_l bundle: `$HOME/.insightface/models/buffalo_l`.
pub fn default_model_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".insightface/models/buffalo_l")
}
