//! Validated 21-landmark hand frames.

use crate::provider::types::{Landmark, LANDMARK_COUNT};

/// Classification failures. An unrecognized pose is not an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GestureError {
    #[error("malformed hand input: {0}")]
    MalformedInput(MalformedReason),
}

/// Why a landmark set was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedReason {
    #[error("expected 21 landmarks, got {0}")]
    WrongArity(usize),
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("landmark {index} at ({x:.3}, {y:.3}) is outside the frame")]
    OutOfRange { index: usize, x: f32, y: f32 },
}

impl From<MalformedReason> for GestureError {
    fn from(reason: MalformedReason) -> Self {
        GestureError::MalformedInput(reason)
    }
}

/// Exactly 21 landmarks that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct HandFrame {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl HandFrame {
    /// Validate raw landmarks.
    ///
    /// `tolerance` widens the accepted `[0, 1]` range for x/y, since extractors
    /// extrapolate joints slightly outside the image near the frame edge.
    pub fn from_landmarks(landmarks: &[Landmark], tolerance: f32) -> Result<Self, GestureError> {
        if landmarks.len() != LANDMARK_COUNT {
            return Err(MalformedReason::WrongArity(landmarks.len()).into());
        }

        let low = -tolerance;
        let high = 1.0 + tolerance;
        for (index, lm) in landmarks.iter().enumerate() {
            if !lm.is_finite() {
                return Err(MalformedReason::NonFinite { index }.into());
            }
            if lm.x < low || lm.x > high || lm.y < low || lm.y > high {
                return Err(MalformedReason::OutOfRange {
                    index,
                    x: lm.x,
                    y: lm.y,
                }
                .into());
            }
        }

        let mut frame = [Landmark::default(); LANDMARK_COUNT];
        frame.copy_from_slice(landmarks);
        Ok(Self { landmarks: frame })
    }

    pub fn landmark(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: usize) -> Vec<Landmark> {
        (0..count)
            .map(|i| Landmark::new(0.2 + i as f32 * 0.02, 0.5, 0.0))
            .collect()
    }

    #[test]
    fn test_accepts_exactly_21() {
        let frame = HandFrame::from_landmarks(&grid(21), 0.25).unwrap();
        assert_eq!(frame.landmarks().len(), 21);
        assert_eq!(frame.landmark(20).x, grid(21)[20].x);
    }

    #[test]
    fn test_rejects_wrong_arity() {
        assert_eq!(
            HandFrame::from_landmarks(&grid(18), 0.25),
            Err(GestureError::MalformedInput(MalformedReason::WrongArity(18)))
        );
        assert_eq!(
            HandFrame::from_landmarks(&grid(22), 0.25),
            Err(GestureError::MalformedInput(MalformedReason::WrongArity(22)))
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut landmarks = grid(21);
        landmarks[3].y = f32::NAN;
        assert_eq!(
            HandFrame::from_landmarks(&landmarks, 0.25),
            Err(GestureError::MalformedInput(MalformedReason::NonFinite { index: 3 }))
        );

        let mut landmarks = grid(21);
        landmarks[7].x = 1.4;
        assert!(matches!(
            HandFrame::from_landmarks(&landmarks, 0.25),
            Err(GestureError::MalformedInput(MalformedReason::OutOfRange { index: 7, .. }))
        ));

        // Slight overshoot at the edge is tolerated.
        let mut landmarks = grid(21);
        landmarks[7].x = 1.1;
        assert!(HandFrame::from_landmarks(&landmarks, 0.25).is_ok());
    }
}
