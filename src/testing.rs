//! Test doubles for the provider, capture, loader and backend seams.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use glam::Mat4;
use tokio::sync::{oneshot, watch, Notify};

use crate::capture::{CaptureConstraints, CaptureDevice, CaptureSession, Frame, VideoStream};
use crate::error::{AssetError, CaptureError, TrackingError};
use crate::render::{DrawCall, RenderBackend};
use crate::scene::{AssetLoader, SceneNode};
use crate::tracking::{
    DetectionResult, Landmark, LandmarkProvider, LandmarkProviderFactory, LandmarkSet,
    ProviderOptions, RunningMode, LEFT_EYE_OUTER, RIGHT_EYE_OUTER,
};

/// A full 468-point face with every point at the frame centre except the
/// outer eye corners.
pub fn face_with_eyes(left: [f32; 3], right: [f32; 3]) -> LandmarkSet {
    let mut points = vec![Landmark::new(0.5, 0.5, 0.0); 468];
    points[LEFT_EYE_OUTER] = left.into();
    points[RIGHT_EYE_OUTER] = right.into();
    LandmarkSet::new(points)
}

/// Shared view of a [`ScriptedProvider`] that outlives moving it into a tracker
#[derive(Clone, Default)]
pub struct ProviderStats {
    detections: Arc<AtomicUsize>,
    mode_switches: Arc<AtomicUsize>,
    result: Arc<Mutex<DetectionResult>>,
    error: Arc<Mutex<Option<String>>>,
}

impl ProviderStats {
    pub fn detections(&self) -> usize {
        self.detections.load(Ordering::SeqCst)
    }

    pub fn mode_switches(&self) -> usize {
        self.mode_switches.load(Ordering::SeqCst)
    }

    pub fn set_result(&self, result: DetectionResult) {
        *self.result.lock().unwrap() = result;
    }

    /// Fail every detection with `message` until cleared with `None`.
    pub fn set_error(&self, message: Option<&str>) {
        *self.error.lock().unwrap() = message.map(str::to_string);
    }
}

/// Where a [`ScriptedProvider`] stops its session
#[derive(Clone, Copy, PartialEq, Eq)]
enum StopPoint {
    ModeSwitch,
    Detection,
}

/// Provider returning a scripted result for every detection.
pub struct ScriptedProvider {
    mode: RunningMode,
    stats: ProviderStats,
    stop: Option<(StopPoint, CaptureSession)>,
}

impl ScriptedProvider {
    pub fn new(result: DetectionResult) -> Self {
        let stats = ProviderStats::default();
        stats.set_result(result);
        Self {
            mode: RunningMode::Image,
            stats,
            stop: None,
        }
    }

    pub fn stats(&self) -> ProviderStats {
        self.stats.clone()
    }

    /// Stop `session` while each video detection is in flight.
    pub fn stopping(mut self, session: CaptureSession) -> Self {
        self.stop = Some((StopPoint::Detection, session));
        self
    }

    /// Stop `session` while the switch to video mode is in flight.
    pub fn stopping_on_switch(mut self, session: CaptureSession) -> Self {
        self.stop = Some((StopPoint::ModeSwitch, session));
        self
    }

    fn stopper(&self, at: StopPoint) -> Option<CaptureSession> {
        match &self.stop {
            Some((point, session)) if *point == at => Some(session.clone()),
            _ => None,
        }
    }

    fn scripted(&self) -> Result<DetectionResult, TrackingError> {
        self.stats.detections.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.stats.error.lock().unwrap().clone() {
            return Err(TrackingError::Detection(message));
        }
        Ok(self.stats.result.lock().unwrap().clone())
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn running_mode(&self) -> RunningMode {
        self.mode
    }

    fn set_running_mode(
        &mut self,
        mode: RunningMode,
    ) -> impl Future<Output = Result<(), TrackingError>> + Send {
        if mode != self.mode {
            self.stats.mode_switches.fetch_add(1, Ordering::SeqCst);
        }
        self.mode = mode;
        let stop = self.stopper(StopPoint::ModeSwitch);
        async move {
            tokio::task::yield_now().await;
            if let Some(session) = stop {
                session.stop();
            }
            Ok(())
        }
    }

    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, TrackingError> {
        if self.mode != RunningMode::Image {
            return Err(TrackingError::WrongMode {
                call: "detect",
                mode: self.mode.to_string(),
            });
        }
        self.scripted()
    }

    fn detect_for_video(
        &mut self,
        _frame: &Frame,
        _timestamp_ms: f64,
    ) -> impl Future<Output = Result<DetectionResult, TrackingError>> + Send {
        let result = if self.mode != RunningMode::Video {
            Err(TrackingError::WrongMode {
                call: "detect_for_video",
                mode: self.mode.to_string(),
            })
        } else {
            self.scripted()
        };
        let stop = self.stopper(StopPoint::Detection);
        async move {
            tokio::task::yield_now().await;
            if let Some(session) = stop {
                session.stop();
            }
            result
        }
    }
}

/// Factory whose warm-up finishes when the gate fires (or its sender drops).
pub struct GatedFactory {
    gate: oneshot::Receiver<()>,
    fail: bool,
}

impl GatedFactory {
    pub fn new(gate: oneshot::Receiver<()>) -> Self {
        Self { gate, fail: false }
    }

    pub fn failing(gate: oneshot::Receiver<()>) -> Self {
        Self { gate, fail: true }
    }
}

impl LandmarkProviderFactory for GatedFactory {
    type Provider = ScriptedProvider;

    fn create_from_options(
        self,
        _options: ProviderOptions,
    ) -> impl Future<Output = Result<ScriptedProvider, TrackingError>> + Send {
        async move {
            let _ = self.gate.await;
            if self.fail {
                Err(TrackingError::WarmUp("model missing".to_string()))
            } else {
                Ok(ScriptedProvider::new(DetectionResult::empty()))
            }
        }
    }
}

/// Capture device serving a settable frame.
pub struct FakeDevice {
    frame: Arc<Mutex<Option<Frame>>>,
    stopped: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
    fail_with: Option<fn() -> CaptureError>,
}

impl FakeDevice {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame: Arc::new(Mutex::new(Some(frame))),
            stopped: Arc::new(AtomicBool::new(false)),
            opens: Arc::new(AtomicUsize::new(0)),
            gate: None,
            fail_with: None,
        }
    }

    /// Opens successfully but never presents a frame until one is set.
    pub fn without_frame() -> Self {
        let device = Self::new(Frame::new(0.0, 0, 0));
        *device.frame.lock().unwrap() = None;
        device
    }

    pub fn failing(fail_with: fn() -> CaptureError) -> Self {
        Self {
            fail_with: Some(fail_with),
            ..Self::without_frame()
        }
    }

    /// Opening blocks until the returned gate is notified.
    pub fn gated(frame: Frame) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let device = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new(frame)
        };
        (device, gate)
    }

    pub fn set_frame(&self, frame: Frame) {
        *self.frame.lock().unwrap() = Some(frame);
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for FakeDevice {
    fn open(
        &self,
        _constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<Box<dyn VideoStream>, CaptureError>> + Send {
        let frame = Arc::clone(&self.frame);
        let stopped = Arc::clone(&self.stopped);
        let opens = Arc::clone(&self.opens);
        let gate = self.gate.clone();
        let fail_with = self.fail_with;

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            opens.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = fail_with {
                return Err(fail());
            }
            Ok(Box::new(FakeStream {
                frame,
                stopped,
                live: true,
            }) as Box<dyn VideoStream>)
        }
    }
}

struct FakeStream {
    frame: Arc<Mutex<Option<Frame>>>,
    stopped: Arc<AtomicBool>,
    live: bool,
}

impl VideoStream for FakeStream {
    fn current_frame(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }
        self.frame.lock().unwrap().clone()
    }

    fn stop(&mut self) {
        self.live = false;
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Loader returning a fixed scene, or `NotFound` when built with `failing`.
pub struct FakeLoader {
    scene: Option<SceneNode>,
    gate: Option<Arc<Notify>>,
    loads: AtomicUsize,
}

impl FakeLoader {
    pub fn ok(scene: SceneNode) -> Self {
        Self {
            scene: Some(scene),
            gate: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            scene: None,
            gate: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn gated(scene: SceneNode) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let loader = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::ok(scene)
        };
        (loader, gate)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl AssetLoader for FakeLoader {
    fn load(
        &self,
        path: &Path,
        progress: watch::Sender<f32>,
    ) -> impl Future<Output = Result<SceneNode, AssetError>> + Send {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let scene = self.scene.clone();
        let gate = self.gate.clone();
        let path = path.display().to_string();

        async move {
            progress.send_replace(0.5);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let scene = scene.ok_or(AssetError::NotFound(path))?;
            progress.send_replace(1.0);
            Ok(scene)
        }
    }
}

/// Backend that only counts what it is asked to do.
#[derive(Default)]
pub struct CountingBackend {
    pub frames: usize,
    pub draws: usize,
    pub resizes: Vec<(u32, u32)>,
    /// Model matrix of every draw, in submission order
    pub models: Vec<Mat4>,
}

impl RenderBackend for CountingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        self.resizes.push((width, height));
    }

    fn begin_frame(&mut self, _clear: [f32; 4]) {
        self.frames += 1;
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        self.draws += 1;
        self.models.push(Mat4::from_cols_array_2d(&call.uniforms.model));
    }

    fn end_frame(&mut self) {}
}
