//! Tracking module
//!
//! Face landmark types, the landmark provider abstraction with its warm-up
//! slot, and a replay provider driven by recorded detections.

pub mod landmarks;
pub mod provider;
pub mod replay;

pub use landmarks::{
    DetectionResult, Landmark, LandmarkSet, LEFT_EYE_OUTER, MIN_LANDMARKS, NOSE_BRIDGE,
    RIGHT_EYE_OUTER,
};
pub use provider::{
    Delegate, LandmarkProvider, LandmarkProviderFactory, ProviderOptions, RunningMode, Tracker,
    TrackerHandle, TrackerStatus,
};
pub use replay::{RecordedDetection, ReplayFactory, ReplayProvider};
