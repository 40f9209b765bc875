use crate::types::DetectedFace;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("no faces to select from")]
    EmptyInput,
}

/// Pick the face with the largest bounding-box area.
///
/// Among equal areas the first one in iteration order wins.
pub fn largest_face(faces: &[DetectedFace]) -> Result<&DetectedFace, SelectionError> {
    let (first, rest) = faces.split_first().ok_or(SelectionError::EmptyInput)?;

    let mut best = first;
    let mut best_area = first.bbox.area();
    for face in rest {
        let area = face.bbox.area();
        if area > best_area {
            best = face;
            best_area = area;
        }
    }

    Ok(best)
}
