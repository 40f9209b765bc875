//! L2 normalization and thresholded cosine comparison of embeddings.

use crate::types::EMBEDDING_DIM;
use serde::Serialize;
use thiserror::Error;

/// Cosine threshold used when a caller does not supply one.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;

/// Added to the norm so an all-zero vector normalizes to all zeros instead of NaN.
const NORM_EPSILON: f32 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompareError {
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Outcome of comparing two embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub cosine: f32,
    pub threshold: f64,
    pub is_match: bool,
}

/// Scale `values` to unit L2 norm.
pub fn l2_normalize(values: &[f32]) -> Vec<f32> {
    let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    let divisor = norm + NORM_EPSILON;
    values.iter().map(|x| x / divisor).collect()
}

/// Dot product. Equals cosine similarity only when both inputs are unit vectors.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_dim(values: &[f32]) -> Result<(), CompareError> {
    if values.len() != EMBEDDING_DIM {
        return Err(CompareError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Normalize both embeddings, take their cosine similarity and apply `threshold`.
///
/// Both inputs must be exactly [`EMBEDDING_DIM`] long; nothing is computed otherwise.
/// A cosine equal to the threshold counts as a match. The threshold is kept
/// at full precision and echoed back unchanged.
pub fn compare(a: &[f32], b: &[f32], threshold: f64) -> Result<Comparison, CompareError> {
    check_dim(a)?;
    check_dim(b)?;

    let cosine = dot(&l2_normalize(a), &l2_normalize(b));

    Ok(Comparison {
        cosine,
        threshold,
        is_match: f64::from(cosine) >= threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    fn ramp() -> Vec<f32> {
        (0..EMBEDDING_DIM).map(|i| (i as f32 * 0.37).sin()).collect()
    }

    #[test]
    fn test_normalize_unit_length() {
        let n = l2_normalize(&ramp());
        let norm: f32 = n.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm = {norm}");
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = l2_normalize(&ramp());
        let twice = l2_normalize(&once);
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_zero_vector() {
        let n = l2_normalize(&vec![0.0; EMBEDDING_DIM]);
        assert!(n.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_compare_same_direction() {
        let a = ramp();
        let b: Vec<f32> = a.iter().map(|x| x * 3.5).collect();
        let c = compare(&a, &b, DEFAULT_MATCH_THRESHOLD).unwrap();
        assert!((c.cosine - 1.0).abs() < 1e-5, "cosine = {}", c.cosine);
        assert!(c.is_match);
    }

    #[test]
    fn test_compare_orthogonal() {
        let c = compare(&basis(0), &basis(7), DEFAULT_MATCH_THRESHOLD).unwrap();
        assert!(c.cosine.abs() < 1e-6);
        assert!(!c.is_match);
    }

    #[test]
    fn test_compare_opposite() {
        let a = ramp();
        let b: Vec<f32> = a.iter().map(|x| -x).collect();
        let c = compare(&a, &b, -1.0).unwrap();
        assert!((c.cosine + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_threshold_boundary_matches() {
        // cosine of identical basis vectors is exactly 1.0
        let c = compare(&basis(3), &basis(3), 1.0).unwrap();
        assert_eq!(c.cosine, 1.0);
        assert!(c.is_match);
    }

    #[test]
    fn test_threshold_is_echoed() {
        let c = compare(&basis(0), &basis(0), 0.8).unwrap();
        assert_eq!(c.threshold, 0.8);
    }

    #[test]
    fn test_threshold_keeps_full_precision() {
        let c = compare(&basis(0), &basis(1), 0.1234567891).unwrap();
        assert_eq!(c.threshold, 0.1234567891);
        assert!(!c.is_match);
    }

    #[test]
    fn test_dimension_mismatch() {
        let short = vec![1.0; EMBEDDING_DIM - 1];
        let long = vec![1.0; EMBEDDING_DIM + 1];
        let ok = basis(0);

        assert_eq!(
            compare(&short, &ok, 0.5),
            Err(CompareError::DimensionMismatch { expected: 512, actual: 511 })
        );
        assert_eq!(
            compare(&ok, &long, 0.5),
            Err(CompareError::DimensionMismatch { expected: 512, actual: 513 })
        );
    }
}
