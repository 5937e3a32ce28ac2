//! Landmark types delivered by the landmark provider.
//!
//! Coordinates are normalized to the camera frame: `x` and `y` in `[0, 1]`
//! with `y` growing downwards, `z` is relative depth (more negative = closer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of landmarks in a complete hand.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// A single normalized 3-D hand landmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance to another landmark in the image plane.
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Which hand the extractor believes it is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Handedness::Left,
            "right" => Handedness::Right,
            _ => Handedness::Unknown,
        }
    }
}

/// One detected hand as reported by the extractor.
///
/// The landmark list is passed through unvalidated; the classifier decides
/// whether it is well formed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandObservation {
    pub landmarks: Vec<Landmark>,
    pub handedness: Handedness,
    /// Extractor detection confidence (0-1)
    pub score: f32,
}

/// One processed video frame: zero or one hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkSample {
    /// Frame timestamp (extractor-provided or receive time)
    pub timestamp: DateTime<Utc>,
    /// Detected hand, `None` when no hand is present
    pub hand: Option<HandObservation>,
}

impl LandmarkSample {
    pub fn new(timestamp: DateTime<Utc>, hand: Option<HandObservation>) -> Self {
        Self { timestamp, hand }
    }

    pub fn has_hand(&self) -> bool {
        self.hand.is_some()
    }
}

/// Everything the provider thread can hand to the frame loop.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A processed frame
    Sample(LandmarkSample),
    /// A line that could not be used (parse failure or extractor-reported error)
    Error(String),
}

// Wire format of one JSON line emitted by the extractor.

#[derive(Debug, Deserialize)]
pub(crate) struct WireLandmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireHand {
    #[serde(default)]
    pub handedness: Option<String>,
    #[serde(default = "default_score")]
    pub score: f32,
    pub landmarks: Vec<WireLandmark>,
}

fn default_score() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireFrame {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hands: Vec<WireHand>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<WireHand> for HandObservation {
    fn from(hand: WireHand) -> Self {
        Self {
            landmarks: hand
                .landmarks
                .into_iter()
                .map(|lm| Landmark::new(lm.x, lm.y, lm.z))
                .collect(),
            handedness: hand
                .handedness
                .as_deref()
                .map(Handedness::from_label)
                .unwrap_or(Handedness::Unknown),
            score: hand.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_distance_ignores_depth() {
        let a = Landmark::new(0.0, 0.0, -0.5);
        let b = Landmark::new(0.3, 0.4, 0.9);
        assert!((a.planar_distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_handedness_parsing() {
        assert_eq!(Handedness::from_label("Right"), Handedness::Right);
        assert_eq!(Handedness::from_label(" left "), Handedness::Left);
        assert_eq!(Handedness::from_label("ambidextrous"), Handedness::Unknown);
    }

    #[test]
    fn test_wire_hand_conversion_keeps_arity() {
        let json = r#"{"handedness":"Left","score":0.8,"landmarks":[{"x":0.1,"y":0.2},{"x":0.3,"y":0.4,"z":-0.1}]}"#;
        let wire: WireHand = serde_json::from_str(json).unwrap();
        let hand = HandObservation::from(wire);
        assert_eq!(hand.landmarks.len(), 2);
        assert_eq!(hand.handedness, Handedness::Left);
        assert_eq!(hand.landmarks[0].z, 0.0);
    }
}
