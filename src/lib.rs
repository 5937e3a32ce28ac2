//! Gesture Home Agent - hand gestures as smart-home triggers.
//!
//! A landmark extractor reports 21 hand landmarks per camera frame. Each
//! frame is classified into one of a fixed set of static gestures, and the
//! dispatcher turns recognized gestures into rate-limited calls against a
//! home automation backend (IFTTT, Home Assistant or Google SDM).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Gesture Home Agent                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │  Provider  │──▶│ Classifier │──▶│ Dispatcher │──┐         │
//! │  │ (extractor)│   │  (rules)   │   │ (cooldown) │  │         │
//! │  └────────────┘   └────────────┘   └────────────┘  ▼         │
//! │         │                │         ┌────────────────────┐    │
//! │         ▼                ▼         │ Executor → Backend │    │
//! │  ┌──────────────────────────┐      │  (per-label queue) │    │
//! │  │       Activity Log       │      └────────────────────┘    │
//! │  └──────────────────────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gesture_home_agent::{gesture, provider};
//!
//! let classifier = gesture::GestureClassifier::default();
//! let sample = provider::parse_line(r#"{"hands": []}"#, 0.7, chrono::Utc::now());
//! if let provider::ProviderEvent::Sample(sample) = sample {
//!     let label = classifier.recognize(sample.hand.as_ref()).unwrap().label;
//!     assert!(label.is_none());
//! }
//! ```

pub mod activity;
pub mod agent;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod gesture;
pub mod provider;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use agent::{Agent, FrameOutcome, RunSummary, StopReason};
pub use backend::{create_backend, Backend, BackendError, BackendKind};
pub use config::{Config, ConfigError};
pub use dispatch::{ActionEvent, Decision, Delivery, Dispatcher, GestureAction, GestureTable};
pub use gesture::{ClassifierThresholds, GestureClassifier, GestureError, GestureLabel};
pub use provider::{LandmarkProvider, LandmarkSample, ProviderConfig, ProviderSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Actions understood by at least one backend.
pub const KNOWN_ACTIONS: [&str; 11] = [
    "ac_toggle",
    "ac_on",
    "ac_off",
    "ac_increase_temp",
    "ac_decrease_temp",
    "lights_on",
    "lights_off",
    "lights_toggle",
    "volume_up",
    "volume_down",
    "custom_scene",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_actions_map_to_home_assistant() {
        for action in KNOWN_ACTIONS {
            assert!(
                backend::home_assistant::service_for(action).is_some(),
                "{action}"
            );
        }
    }
}
