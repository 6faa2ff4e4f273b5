//! User-facing camera controls.
//!
//! These are the enable and close actions: enabling is refused until the
//! landmark provider has finished warming up, closing releases the device.

use crate::capture::{CaptureConstraints, CaptureDevice, CaptureSession};
use crate::error::{Result, TrackingError};
use crate::tracking::TrackerHandle;

/// Start the camera once the landmark provider is ready.
pub async fn enable_camera<D: CaptureDevice>(
    session: &CaptureSession,
    tracker: &TrackerHandle,
    device: &D,
    constraints: &CaptureConstraints,
) -> Result<()> {
    if !tracker.is_ready() {
        tracing::warn!("Wait! Landmark provider not loaded yet");
        return Err(TrackingError::ProviderUnavailable.into());
    }

    session.start(device, constraints).await?;
    Ok(())
}

/// Stop the camera. Returns false when it was not running.
pub fn close_camera(session: &CaptureSession) -> bool {
    session.stop()
}
