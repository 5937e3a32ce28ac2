//! Static hand gesture recognition.
//!
//! A frame of 21 landmarks is validated into a [`HandFrame`], reduced to a
//! [`HandPose`] (finger extension flags plus a few distances) and matched
//! against an ordered rule table. The classifier keeps no state between
//! frames.

pub mod classifier;
pub mod features;
pub mod frame;
pub mod label;

pub use classifier::{
    ClassifierThresholds, GestureClassifier, GestureRule, InvalidThreshold, Recognition,
    GESTURE_RULES,
};
pub use features::{FingerStates, HandPose};
pub use frame::{GestureError, HandFrame, MalformedReason};
pub use label::{GestureLabel, UnknownGesture};
