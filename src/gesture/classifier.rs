//! Rule-based gesture classification.
//!
//! Rules are evaluated in a fixed order, most specific first, and the first
//! match wins. The order in [`GESTURE_RULES`] is the tie-break policy.

use crate::gesture::features::HandPose;
use crate::gesture::frame::{GestureError, HandFrame};
use crate::gesture::label::GestureLabel;
use crate::provider::types::{HandObservation, Handedness, Landmark};
use serde::{Deserialize, Serialize};

/// Relative margin by which a fingertip must clear its reference joint.
pub const DEFAULT_EXTENSION_MARGIN: f32 = 0.10;

/// Thumb-index tip distance below which a Heart is considered.
pub const DEFAULT_HEART_TOUCH_DISTANCE: f32 = 0.06;

/// Thumb-index tip distance below which an OK sign is considered.
pub const DEFAULT_OK_TOUCH_DISTANCE: f32 = 0.08;

/// How far outside `[0, 1]` a landmark may lie before the frame is rejected.
pub const DEFAULT_COORDINATE_TOLERANCE: f32 = 0.25;

/// Calibration knobs for the classifier.
///
/// Distances are in normalized image units, so they depend on how large the
/// hand appears in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub extension_margin: f32,
    pub heart_touch_distance: f32,
    pub ok_touch_distance: f32,
    pub coordinate_tolerance: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            extension_margin: DEFAULT_EXTENSION_MARGIN,
            heart_touch_distance: DEFAULT_HEART_TOUCH_DISTANCE,
            ok_touch_distance: DEFAULT_OK_TOUCH_DISTANCE,
            coordinate_tolerance: DEFAULT_COORDINATE_TOLERANCE,
        }
    }
}

/// A threshold that cannot be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("classifier threshold '{name}' must be {requirement}, got {value}")]
pub struct InvalidThreshold {
    pub name: &'static str,
    pub requirement: &'static str,
    pub value: f32,
}

impl ClassifierThresholds {
    pub fn validate(&self) -> Result<(), InvalidThreshold> {
        let positive = [
            ("heart_touch_distance", self.heart_touch_distance),
            ("ok_touch_distance", self.ok_touch_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(InvalidThreshold {
                    name,
                    requirement: "finite and > 0",
                    value,
                });
            }
        }

        let non_negative = [
            ("extension_margin", self.extension_margin),
            ("coordinate_tolerance", self.coordinate_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidThreshold {
                    name,
                    requirement: "finite and >= 0",
                    value,
                });
            }
        }
        Ok(())
    }
}

/// One entry of the ordered rule table.
#[derive(Clone, Copy)]
pub struct GestureRule {
    pub label: GestureLabel,
    pub matches: fn(&HandPose, &ClassifierThresholds) -> bool,
}

impl std::fmt::Debug for GestureRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureRule")
            .field("label", &self.label)
            .finish()
    }
}

/// Gesture rules in priority order.
pub const GESTURE_RULES: [GestureRule; 9] = [
    GestureRule {
        label: GestureLabel::Heart,
        matches: is_heart,
    },
    GestureRule {
        label: GestureLabel::OkSign,
        matches: is_ok_sign,
    },
    GestureRule {
        label: GestureLabel::Fist,
        matches: is_fist,
    },
    GestureRule {
        label: GestureLabel::OpenPalm,
        matches: is_open_palm,
    },
    GestureRule {
        label: GestureLabel::Peace,
        matches: is_peace,
    },
    GestureRule {
        label: GestureLabel::RockOn,
        matches: is_rock_on,
    },
    GestureRule {
        label: GestureLabel::Point,
        matches: is_point,
    },
    GestureRule {
        label: GestureLabel::ThumbsUp,
        matches: is_thumbs_up,
    },
    GestureRule {
        label: GestureLabel::ThumbsDown,
        matches: is_thumbs_down,
    },
];

fn is_heart(pose: &HandPose, t: &ClassifierThresholds) -> bool {
    let f = &pose.fingers;
    pose.thumb_index_distance < t.heart_touch_distance && !(f.middle && f.ring && f.pinky)
}

fn is_ok_sign(pose: &HandPose, t: &ClassifierThresholds) -> bool {
    let f = &pose.fingers;
    pose.thumb_index_distance < t.ok_touch_distance && f.middle && f.ring && f.pinky
}

fn is_fist(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    pose.fingers.extended_count() == 0
}

fn is_open_palm(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    pose.fingers.extended_count() == 5
}

fn is_peace(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    let f = &pose.fingers;
    f.index && f.middle && !f.thumb && !f.ring && !f.pinky
}

fn is_rock_on(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    let f = &pose.fingers;
    f.index && f.pinky && !f.middle && !f.ring
}

fn is_point(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    let f = &pose.fingers;
    f.index && !f.thumb && !f.middle && !f.ring && !f.pinky
}

fn thumb_only(pose: &HandPose) -> bool {
    let f = &pose.fingers;
    f.thumb && !f.index && !f.middle && !f.ring && !f.pinky
}

fn is_thumbs_up(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    thumb_only(pose) && pose.thumb_above_wrist
}

fn is_thumbs_down(pose: &HandPose, _: &ClassifierThresholds) -> bool {
    thumb_only(pose) && !pose.thumb_above_wrist
}

/// Result of classifying one observation, with the features behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub label: GestureLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<HandPose>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
}

impl Recognition {
    /// Outcome for a frame with no hand.
    pub fn no_hand() -> Self {
        Self {
            label: GestureLabel::None,
            pose: None,
            handedness: None,
        }
    }
}

/// Stateless landmark-to-label classifier.
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    thresholds: ClassifierThresholds,
}

impl GestureClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify a hand, or the absence of one.
    ///
    /// Fails only for malformed landmark sets; an unrecognized pose is
    /// `GestureLabel::None`.
    pub fn classify(&self, landmarks: Option<&[Landmark]>) -> Result<GestureLabel, GestureError> {
        match landmarks {
            None => Ok(GestureLabel::None),
            Some(landmarks) => {
                let frame =
                    HandFrame::from_landmarks(landmarks, self.thresholds.coordinate_tolerance)?;
                Ok(self.classify_frame(&frame))
            }
        }
    }

    /// Classify an already validated frame.
    pub fn classify_frame(&self, frame: &HandFrame) -> GestureLabel {
        self.label_for(&HandPose::from_frame(frame, &self.thresholds))
    }

    /// Classify an extractor observation and keep the pose for diagnostics.
    pub fn recognize(&self, hand: Option<&HandObservation>) -> Result<Recognition, GestureError> {
        let Some(hand) = hand else {
            return Ok(Recognition::no_hand());
        };

        let frame =
            HandFrame::from_landmarks(&hand.landmarks, self.thresholds.coordinate_tolerance)?;
        let pose = HandPose::from_frame(&frame, &self.thresholds);
        Ok(Recognition {
            label: self.label_for(&pose),
            pose: Some(pose),
            handedness: Some(hand.handedness),
        })
    }

    /// First matching rule, or `None`.
    pub fn label_for(&self, pose: &HandPose) -> GestureLabel {
        GESTURE_RULES
            .iter()
            .find(|rule| (rule.matches)(pose, &self.thresholds))
            .map(|rule| rule.label)
            .unwrap_or(GestureLabel::None)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{flip_vertical, hand, pinch};
    use super::*;
    use crate::gesture::frame::MalformedReason;

    fn classify(lms: &[Landmark]) -> GestureLabel {
        GestureClassifier::default().classify(Some(lms)).unwrap()
    }

    #[test]
    fn test_open_palm_and_fist() {
        assert_eq!(classify(&hand([true; 5])), GestureLabel::OpenPalm);
        assert_eq!(classify(&hand([false; 5])), GestureLabel::Fist);
    }

    #[test]
    fn test_single_pattern_gestures() {
        assert_eq!(
            classify(&hand([false, true, true, false, false])),
            GestureLabel::Peace
        );
        assert_eq!(
            classify(&hand([false, true, false, false, false])),
            GestureLabel::Point
        );
        assert_eq!(
            classify(&hand([true, false, false, false, false])),
            GestureLabel::ThumbsUp
        );
        assert_eq!(
            classify(&flip_vertical(hand([true, false, false, false, false]))),
            GestureLabel::ThumbsDown
        );
    }

    #[test]
    fn test_rock_on_ignores_thumb() {
        assert_eq!(
            classify(&hand([false, true, false, false, true])),
            GestureLabel::RockOn
        );
        assert_eq!(
            classify(&hand([true, true, false, false, true])),
            GestureLabel::RockOn
        );
    }

    #[test]
    fn test_heart_when_tips_touch() {
        let lms = pinch(hand([false, true, false, false, false]), 0.02, 0.01);
        assert_eq!(classify(&lms), GestureLabel::Heart);
    }

    #[test]
    fn test_ok_sign_beats_heart_when_three_fingers_extended() {
        // Inside both distance thresholds: only the finger pattern separates them.
        let lms = pinch(hand([false, true, true, true, true]), 0.02, 0.01);
        let thresholds = ClassifierThresholds::default();
        let frame = HandFrame::from_landmarks(&lms, thresholds.coordinate_tolerance).unwrap();
        let pose = HandPose::from_frame(&frame, &thresholds);
        assert!(pose.thumb_index_distance < thresholds.heart_touch_distance);
        assert!(pose.thumb_index_distance < thresholds.ok_touch_distance);

        assert_eq!(classify(&lms), GestureLabel::OkSign);
    }

    #[test]
    fn test_ok_sign_uses_looser_distance() {
        // ~0.064 apart: too far for Heart, close enough for OK.
        let lms = pinch(hand([false, true, true, true, true]), 0.05, 0.04);
        assert_eq!(classify(&lms), GestureLabel::OkSign);
    }

    #[test]
    fn test_unrecognized_pose_is_none() {
        assert_eq!(
            classify(&hand([false, true, true, true, false])),
            GestureLabel::None
        );
    }

    #[test]
    fn test_absent_hand_is_none() {
        let classifier = GestureClassifier::default();
        assert_eq!(classifier.classify(None), Ok(GestureLabel::None));
        assert_eq!(classifier.recognize(None).unwrap(), Recognition::no_hand());
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let mut lms = hand([true; 5]);
        lms.truncate(18);
        assert_eq!(
            GestureClassifier::default().classify(Some(&lms)),
            Err(GestureError::MalformedInput(MalformedReason::WrongArity(18)))
        );
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let order: Vec<GestureLabel> = GESTURE_RULES.iter().map(|r| r.label).collect();
        assert_eq!(
            order,
            vec![
                GestureLabel::Heart,
                GestureLabel::OkSign,
                GestureLabel::Fist,
                GestureLabel::OpenPalm,
                GestureLabel::Peace,
                GestureLabel::RockOn,
                GestureLabel::Point,
                GestureLabel::ThumbsUp,
                GestureLabel::ThumbsDown,
            ]
        );
    }

    /// Expected label for an upright hand whose thumb and index tips are apart.
    fn expected_label(flags: [bool; 5]) -> GestureLabel {
        match flags {
            [false, false, false, false, false] => GestureLabel::Fist,
            [true, true, true, true, true] => GestureLabel::OpenPalm,
            [false, true, true, false, false] => GestureLabel::Peace,
            [_, true, false, false, true] => GestureLabel::RockOn,
            [false, true, false, false, false] => GestureLabel::Point,
            [true, false, false, false, false] => GestureLabel::ThumbsUp,
            _ => GestureLabel::None,
        }
    }

    #[test]
    fn test_every_finger_pattern_yields_expected_label() {
        let classifier = GestureClassifier::default();
        let mut recognized = 0;
        for bits in 0u8..32 {
            let flags = [0, 1, 2, 3, 4].map(|i| bits & (1 << i) != 0);
            let label = classifier.classify(Some(&hand(flags))).unwrap();
            assert_eq!(label, expected_label(flags), "pattern {flags:?}");
            if !label.is_none() {
                recognized += 1;
            }
        }
        // RockOn matches with the thumb either way.
        assert_eq!(recognized, 7);
    }

    #[test]
    fn test_recognize_keeps_pose_and_handedness() {
        let observation = HandObservation {
            landmarks: hand([false, true, true, false, false]),
            handedness: Handedness::Right,
            score: 0.9,
        };
        let recognition = GestureClassifier::default()
            .recognize(Some(&observation))
            .unwrap();
        assert_eq!(recognition.label, GestureLabel::Peace);
        assert_eq!(recognition.handedness, Some(Handedness::Right));
        assert_eq!(recognition.pose.unwrap().fingers.extended_count(), 2);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ClassifierThresholds::default().validate().is_ok());

        let bad = ClassifierThresholds {
            ok_touch_distance: 0.0,
            ..ClassifierThresholds::default()
        };
        assert_eq!(bad.validate().unwrap_err().name, "ok_touch_distance");

        let bad = ClassifierThresholds {
            extension_margin: f32::NAN,
            ..ClassifierThresholds::default()
        };
        assert_eq!(bad.validate().unwrap_err().name, "extension_margin");
    }
}
