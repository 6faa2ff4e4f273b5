//! Capture session lifecycle.
//!
//! A [`CaptureSession`] is a cloneable handle shared by the UI controls (start
//! and stop) and the frame scheduler (frame polling). Every `start` begins a
//! new generation; work tagged with an older generation is stale.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::error::CaptureError;

use super::device::{CaptureConstraints, CaptureDevice, Frame, FrameDimensions, VideoStream};

/// Lifecycle state of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Acquiring,
    Active,
    Stopped,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Acquiring)
                | (Stopped, Acquiring)
                | (Acquiring, Active)
                | (Acquiring, Idle)
                | (Acquiring, Stopped)
                | (Active, Stopped)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Active => "active",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Projection calibration derived from the first frame of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub width: u32,
    pub height: u32,
    pub aspect: f32,
}

impl Calibration {
    pub fn from_dimensions(dims: FrameDimensions) -> Option<Self> {
        dims.aspect().map(|aspect| Self {
            width: dims.width,
            height: dims.height,
            aspect,
        })
    }
}

struct Inner {
    state: SessionState,
    generation: u64,
    stream: Option<Box<dyn VideoStream>>,
    calibration: Option<Calibration>,
    first_frame_waiters: Vec<oneshot::Sender<FrameDimensions>>,
}

impl Inner {
    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!("Capture session {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Shared handle to the video capture lifecycle
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<Mutex<Inner>>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                generation: 0,
                stream: None,
                calibration: None,
                first_frame_waiters: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Counter bumped on every `start`
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn calibration(&self) -> Option<Calibration> {
        self.lock().calibration
    }

    /// True while `generation` is the current, active session
    pub fn is_active_generation(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.state == SessionState::Active && inner.generation == generation
    }

    /// Acquire the device and begin a new session.
    ///
    /// On failure the session returns to `Idle` and may be retried. If `stop`
    /// is called while acquisition is pending, the acquired stream is released
    /// and this returns [`CaptureError::Cancelled`]; the state stays `Stopped`.
    pub async fn start<D: CaptureDevice>(
        &self,
        device: &D,
        constraints: &CaptureConstraints,
    ) -> Result<(), CaptureError> {
        let generation = {
            let mut inner = self.lock();
            if matches!(inner.state, SessionState::Acquiring | SessionState::Active) {
                return Err(CaptureError::AlreadyRunning(inner.state));
            }
            inner.generation += 1;
            inner.calibration = None;
            inner.transition(SessionState::Acquiring);
            inner.generation
        };

        tracing::info!(
            "Acquiring capture device ({}x{}{})",
            constraints.width,
            constraints.height,
            if constraints.exact { ", exact" } else { "" }
        );

        let opened = device.open(constraints).await;

        let mut inner = self.lock();
        if inner.generation != generation || inner.state != SessionState::Acquiring {
            if let Ok(mut stream) = opened {
                stream.stop();
            }
            tracing::debug!("Discarding capture stream for stopped session {}", generation);
            return Err(CaptureError::Cancelled);
        }

        match opened {
            Ok(stream) => {
                inner.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to acquire capture device: {}", e);
                inner.transition(SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Receive the native frame size once the next (or current) session
    /// delivers its first frame.
    pub fn on_first_frame(&self) -> oneshot::Receiver<FrameDimensions> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();
        match (inner.state, inner.calibration) {
            (SessionState::Active, Some(calibration)) => {
                let _ = tx.send(FrameDimensions::new(calibration.width, calibration.height));
            }
            _ => inner.first_frame_waiters.push(tx),
        }
        rx
    }

    /// Current frame of the running session.
    ///
    /// The first frame after `start` calibrates the projection and moves the
    /// session to `Active`.
    pub fn poll_frame(&self) -> Option<Frame> {
        let mut inner = self.lock();
        if !matches!(inner.state, SessionState::Acquiring | SessionState::Active) {
            return None;
        }

        let frame = inner.stream.as_mut()?.current_frame()?;

        if inner.state == SessionState::Acquiring {
            let dims = frame.dimensions();
            let Some(calibration) = Calibration::from_dimensions(dims) else {
                tracing::warn!("Ignoring zero-sized first frame");
                return None;
            };
            inner.calibration = Some(calibration);
            inner.transition(SessionState::Active);
            for waiter in inner.first_frame_waiters.drain(..) {
                let _ = waiter.send(dims);
            }
            tracing::info!(
                "Camera initialized: {}x{}, aspect {:.3}",
                dims.width,
                dims.height,
                calibration.aspect
            );
        } else if let Some(calibration) = inner.calibration {
            if calibration.width != frame.width || calibration.height != frame.height {
                tracing::debug!(
                    "Capture resolution changed to {}x{}; keeping session calibration",
                    frame.width,
                    frame.height
                );
            }
        }

        Some(frame)
    }

    /// Release the device and end the session. Returns false when there was
    /// nothing to stop.
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        if matches!(inner.state, SessionState::Idle | SessionState::Stopped) {
            return false;
        }

        if let Some(mut stream) = inner.stream.take() {
            stream.stop();
        }
        inner.calibration = None;
        inner.first_frame_waiters.clear();
        inner.transition(SessionState::Stopped);
        tracing::info!("Capture session {} stopped", inner.generation);
        true
    }
}
