use serde::{Deserialize, Serialize};

/// Length of an ArcFace embedding.
pub const EMBEDDING_DIM: usize = 512;

/// Detected face region in image pixel coordinates, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// `(right - left) * (bottom - top)`. Not clamped: a degenerate box may yield a negative area.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

/// One face found by a [`FaceAnalyzer`](crate::FaceAnalyzer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    /// Already L2-normalized when present.
    pub embedding: Option<Embedding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_area() {
        let b = BoundingBox {
            left: 10.0, top: 20.0, right: 30.0, bottom: 70.0,
            confidence: 0.9, landmarks: None,
        };
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 50.0);
        assert_eq!(b.area(), 1000.0);
    }

    #[test]
    fn test_embedding_serde_shape() {
        let e = Embedding { values: vec![0.5, -0.5], model_version: Some("w600k_r50".into()) };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["values"], serde_json::json!([0.5, -0.5]));
        assert_eq!(json["model_version"], "w600k_r50");
    }
}
