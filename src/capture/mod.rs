//! Capture module
//!
//! Video input lifecycle: the device abstraction, the shared session handle
//! with its state machine and calibration, and a frame-sequence device.

pub mod device;
pub mod sequence;
pub mod session;

pub use device::{CaptureConstraints, CaptureDevice, Frame, FrameDimensions, VideoStream};
pub use sequence::ImageSequenceDevice;
pub use session::{Calibration, CaptureSession, SessionState};
