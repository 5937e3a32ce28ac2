//! Geometric features computed from a single hand frame.
//!
//! All distances are measured in the image plane. Depth from monocular
//! extractors is too noisy to help with finger extension.

use crate::gesture::classifier::ClassifierThresholds;
use crate::gesture::frame::HandFrame;
use crate::provider::types::*;
use serde::Serialize;

/// (tip, reference joint) per finger, thumb first.
///
/// Fingers are judged against their PIP joint. The thumb uses its MCP joint
/// because the IP-to-tip segment is too short to separate from noise.
const FINGER_JOINTS: [(usize, usize); 5] = [
    (THUMB_TIP, THUMB_MCP),
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

/// Joints averaged to locate the palm center.
const PALM_JOINTS: [usize; 5] = [WRIST, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// Extension flag per finger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerStates {
    pub fn from_array(flags: [bool; 5]) -> Self {
        let [thumb, index, middle, ring, pinky] = flags;
        Self {
            thumb,
            index,
            middle,
            ring,
            pinky,
        }
    }

    pub fn as_array(&self) -> [bool; 5] {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
    }

    /// Number of extended fingers (0-5).
    pub fn extended_count(&self) -> usize {
        self.as_array().iter().filter(|&&up| up).count()
    }

    /// Compact form for logs, e.g. `T I - - P`.
    pub fn pattern(&self) -> String {
        ["T", "I", "M", "R", "P"]
            .iter()
            .zip(self.as_array())
            .map(|(name, up)| if up { *name } else { "-" })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Everything the gesture rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HandPose {
    pub fingers: FingerStates,
    /// Thumb tip to index tip distance
    pub thumb_index_distance: f32,
    /// Thumb tip is above the wrist in the image
    pub thumb_above_wrist: bool,
}

impl HandPose {
    /// Compute pose features for a validated frame.
    pub fn from_frame(frame: &HandFrame, thresholds: &ClassifierThresholds) -> Self {
        let palm = palm_center(frame);

        let mut flags = [false; 5];
        for (flag, (tip, reference)) in flags.iter_mut().zip(FINGER_JOINTS) {
            let tip_dist = frame.landmark(tip).planar_distance(&palm);
            let ref_dist = frame.landmark(reference).planar_distance(&palm);
            *flag = tip_dist > ref_dist * (1.0 + thresholds.extension_margin);
        }

        let thumb_tip = frame.landmark(THUMB_TIP);
        Self {
            fingers: FingerStates::from_array(flags),
            thumb_index_distance: thumb_tip.planar_distance(frame.landmark(INDEX_TIP)),
            // Image y grows downwards.
            thumb_above_wrist: thumb_tip.y < frame.landmark(WRIST).y,
        }
    }
}

fn palm_center(frame: &HandFrame) -> Landmark {
    let n = PALM_JOINTS.len() as f32;
    let (x, y, z) = PALM_JOINTS.iter().fold((0.0, 0.0, 0.0), |(x, y, z), &i| {
        let lm = frame.landmark(i);
        (x + lm.x, y + lm.y, z + lm.z)
    });
    Landmark::new(x / n, y / n, z / n)
}
