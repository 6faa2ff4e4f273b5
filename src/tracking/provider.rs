//! Landmark provider abstraction and its warm-up slot.
//!
//! The detector itself is a black box. Providers are built asynchronously by a
//! [`LandmarkProviderFactory`]; until that finishes the [`Tracker`] reports the
//! provider as unavailable and callers skip detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use crate::capture::Frame;
use crate::config::TrackingConfig;
use crate::error::TrackingError;

use super::landmarks::DetectionResult;

/// Where inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    Cpu,
    #[default]
    Gpu,
}

/// Detection mode. Providers start in `Image` and are switched to `Video`
/// once before the first video detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningMode {
    #[default]
    Image,
    Video,
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "IMAGE"),
            Self::Video => write!(f, "VIDEO"),
        }
    }
}

/// Options a provider is created from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOptions {
    pub delegate: Delegate,
    pub running_mode: RunningMode,
    pub max_faces: u32,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            delegate: Delegate::Gpu,
            running_mode: RunningMode::Image,
            max_faces: 1,
        }
    }
}

impl ProviderOptions {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            delegate: config.delegate,
            running_mode: RunningMode::Image,
            max_faces: config.max_faces,
        }
    }
}

/// A facial landmark detector.
pub trait LandmarkProvider: Send {
    fn running_mode(&self) -> RunningMode;

    /// Switch between image and video mode.
    fn set_running_mode(
        &mut self,
        mode: RunningMode,
    ) -> impl Future<Output = Result<(), TrackingError>> + Send;

    /// Single-image detection. Only valid in `Image` mode.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, TrackingError>;

    /// Video detection with a monotonic timestamp. Only valid in `Video` mode.
    fn detect_for_video(
        &mut self,
        frame: &Frame,
        timestamp_ms: f64,
    ) -> impl Future<Output = Result<DetectionResult, TrackingError>> + Send;
}

/// Builds a provider; this is the asynchronous warm-up (model load).
pub trait LandmarkProviderFactory: Send + 'static {
    type Provider: LandmarkProvider + 'static;

    fn create_from_options(
        self,
        options: ProviderOptions,
    ) -> impl Future<Output = Result<Self::Provider, TrackingError>> + Send;
}

/// Warm-up progress of a [`Tracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Warming,
    Ready,
    Failed,
}

enum Slot<P> {
    Warming(oneshot::Receiver<Result<P, TrackingError>>),
    Ready(P),
    Failed,
}

/// Owns a landmark provider that may still be warming up.
pub struct Tracker<P> {
    slot: Slot<P>,
    status: Arc<watch::Sender<TrackerStatus>>,
}

impl<P: LandmarkProvider + 'static> Tracker<P> {
    /// Start warming up a provider on the runtime.
    pub fn spawn<F>(factory: F, options: ProviderOptions) -> Self
    where
        F: LandmarkProviderFactory<Provider = P>,
    {
        let (status_tx, _) = watch::channel(TrackerStatus::Warming);
        let status = Arc::new(status_tx);
        let (tx, rx) = oneshot::channel();

        tracing::info!(
            "Warming up landmark provider (delegate {:?}, max faces {})",
            options.delegate,
            options.max_faces
        );

        let task_status = Arc::clone(&status);
        tokio::spawn(async move {
            let result = factory.create_from_options(options).await;
            let next = if result.is_ok() {
                TrackerStatus::Ready
            } else {
                TrackerStatus::Failed
            };
            let _ = tx.send(result);
            task_status.send_replace(next);
        });

        Self {
            slot: Slot::Warming(rx),
            status,
        }
    }

    /// Wrap a provider that is already usable.
    pub fn ready(provider: P) -> Self {
        let (status_tx, _) = watch::channel(TrackerStatus::Ready);
        Self {
            slot: Slot::Ready(provider),
            status: Arc::new(status_tx),
        }
    }

    pub fn status(&self) -> TrackerStatus {
        *self.status.borrow()
    }

    /// A cloneable view of the warm-up status for the UI controls
    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            rx: self.status.subscribe(),
        }
    }

    /// The provider, if warm-up has completed.
    pub fn provider_mut(&mut self) -> Option<&mut P> {
        self.poll();
        match &mut self.slot {
            Slot::Ready(provider) => Some(provider),
            _ => None,
        }
    }

    fn poll(&mut self) {
        if let Slot::Warming(rx) = &mut self.slot {
            match rx.try_recv() {
                Ok(Ok(provider)) => {
                    tracing::info!("Landmark provider ready");
                    self.slot = Slot::Ready(provider);
                }
                Ok(Err(e)) => {
                    tracing::error!("Landmark provider warm-up failed: {}", e);
                    self.slot = Slot::Failed;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    tracing::error!("Landmark provider warm-up task ended without a result");
                    self.slot = Slot::Failed;
                    self.status.send_replace(TrackerStatus::Failed);
                }
            }
        }
    }
}

/// Read-only view of a tracker's warm-up status.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    rx: watch::Receiver<TrackerStatus>,
}

impl TrackerHandle {
    pub fn status(&self) -> TrackerStatus {
        *self.rx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == TrackerStatus::Ready
    }

    /// Wait until warm-up has either succeeded or failed.
    pub async fn wait(&mut self) -> TrackerStatus {
        loop {
            let status = *self.rx.borrow_and_update();
            if status != TrackerStatus::Warming {
                return status;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }
}
