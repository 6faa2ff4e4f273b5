//! Trylens - Face-Tracked Eyewear Overlay
//!
//! Core of a virtual try-on pipeline that:
//! - Manages the video capture session lifecycle and its projection calibration
//! - Runs a landmark provider on each new video frame
//! - Maps eye landmarks to a position, scale and rotation for a glasses model
//! - Swaps a placeholder frame for the loaded glTF model when it is ready
//! - Renders the posed model over the video once per display refresh

pub mod capture;
pub mod config;
pub mod controls;
pub mod error;
pub mod pose;
pub mod render;
pub mod scene;
pub mod scheduler;
pub mod stage;
pub mod tracking;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CaptureSession, SessionState};
pub use config::Config;
pub use error::{Result, TrylensError};
pub use pose::{Pose, PoseResolver};
pub use scheduler::{FrameScheduler, RunOptions, TickReport};
pub use stage::{AssetStage, OverlayModel, StageEvent};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
