//! Landmark acquisition for the gesture agent.
//!
//! The hand-landmark model runs in an external extractor process that owns
//! the camera; this module spawns it, reads its per-frame output and hands
//! samples to the frame loop. Recorded streams can be replayed the same way.

pub mod stream;
pub mod types;

// Re-export commonly used types
pub use stream::{
    parse_line, LandmarkProvider, ProviderConfig, ProviderError, ProviderSettings, ProviderSource,
    READY_SIGNAL,
};
pub use types::{
    HandObservation, Handedness, Landmark, LandmarkSample, ProviderEvent, LANDMARK_COUNT,
};
