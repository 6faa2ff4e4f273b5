//! Capture device abstraction and frame type.

use image::RgbaImage;
use std::future::Future;
use std::sync::Arc;

use crate::config::CaptureConfig;
use crate::error::CaptureError;

/// Native pixel dimensions of a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; `None` for a degenerate size.
    pub fn aspect(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }
}

/// One video frame as exposed by a stream
#[derive(Debug, Clone)]
pub struct Frame {
    /// Playback time of the video in seconds; constant until the next frame
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Decoded pixels, when the source provides them
    pub image: Option<Arc<RgbaImage>>,
}

impl Frame {
    pub fn new(timestamp: f64, width: u32, height: u32) -> Self {
        Self {
            timestamp,
            width,
            height,
            image: None,
        }
    }

    pub fn with_image(timestamp: f64, image: Arc<RgbaImage>) -> Self {
        Self {
            timestamp,
            width: image.width(),
            height: image.height(),
            image: Some(image),
        }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }
}

/// Requested capture format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    /// Reject devices that cannot deliver exactly this size
    pub exact: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            exact: false,
        }
    }
}

impl CaptureConstraints {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            exact: config.exact,
        }
    }

    /// Check a device's native size against these constraints.
    pub fn check(&self, native: FrameDimensions) -> Result<(), CaptureError> {
        if self.exact && (native.width != self.width || native.height != self.height) {
            return Err(CaptureError::ConstraintsUnsatisfiable(format!(
                "requested exactly {}x{}, device delivers {}x{}",
                self.width, self.height, native.width, native.height
            )));
        }
        Ok(())
    }
}

/// A running stream of frames from an acquired device.
pub trait VideoStream: Send {
    /// The frame currently presented by the device, if one is available yet.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Stop all underlying tracks and release the device.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// A permission-gated video input device.
pub trait CaptureDevice: Send + Sync {
    fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<Box<dyn VideoStream>, CaptureError>> + Send;
}
