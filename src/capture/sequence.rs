//! Frame-sequence capture device.
//!
//! Plays a directory of still images (sorted by file name) as a live video
//! source. The playback clock starts when the device is opened; the frame
//! timestamp is the video's current time and only advances on frame
//! boundaries, so a display loop faster than `fps` sees repeated timestamps.
//!
//! Frames are decoded on the blocking pool, one ahead of playback. Polling
//! never decodes; until the wanted frame is ready the previous one is shown.

use image::RgbaImage;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::config::CaptureConfig;
use crate::error::CaptureError;

use super::device::{CaptureConstraints, CaptureDevice, Frame, FrameDimensions, VideoStream};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Capture device backed by a directory of frames
#[derive(Debug, Clone)]
pub struct ImageSequenceDevice {
    dir: PathBuf,
    fps: f32,
}

impl ImageSequenceDevice {
    pub fn new<P: AsRef<Path>>(dir: P, fps: f32) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            fps,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(&config.frames_dir, config.fps)
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<Box<dyn VideoStream>, CaptureError>> + Send {
        let dir = self.dir.clone();
        let fps = self.fps;
        let constraints = constraints.clone();

        async move {
            let runtime = Handle::current();
            let stream = tokio::task::spawn_blocking(move || {
                SequenceStream::open(&dir, fps, &constraints, runtime)
            })
            .await
            .map_err(|e| CaptureError::DeviceAbsent(format!("capture task failed: {}", e)))??;

            Ok(Box::new(stream) as Box<dyn VideoStream>)
        }
    }
}

type Decoded = Result<RgbaImage, CaptureError>;

struct SequenceStream {
    paths: Vec<PathBuf>,
    fps: f64,
    started: Instant,
    runtime: Handle,
    current: Option<(u64, Frame)>,
    /// Decode in flight on the blocking pool
    pending: Option<(u64, oneshot::Receiver<Decoded>)>,
    /// Decoded frame waiting for its presentation time
    ready: Option<(u64, Arc<RgbaImage>)>,
    /// Last frame number that failed to decode; it is skipped
    failed: Option<u64>,
    live: bool,
}

impl SequenceStream {
    fn open(
        dir: &Path,
        fps: f32,
        constraints: &CaptureConstraints,
        runtime: Handle,
    ) -> Result<Self, CaptureError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(CaptureError::ConstraintsUnsatisfiable(format!(
                "invalid frame rate {}",
                fps
            )));
        }

        let paths = list_frames(dir)?;
        let first = decode(&paths[0])?;
        constraints.check(FrameDimensions::new(first.width(), first.height()))?;

        tracing::info!(
            "Opened frame sequence {} ({} frames, {}x{} @ {} fps)",
            dir.display(),
            paths.len(),
            first.width(),
            first.height(),
            fps
        );

        Ok(Self {
            paths,
            fps: fps as f64,
            started: Instant::now(),
            runtime,
            current: Some((0, Frame::with_image(0.0, Arc::new(first)))),
            pending: None,
            ready: None,
            failed: None,
            live: true,
        })
    }

    fn frame_number(&self) -> u64 {
        (self.started.elapsed().as_secs_f64() * self.fps).floor() as u64
    }

    fn shown(&self) -> Option<u64> {
        self.current.as_ref().map(|(number, _)| *number)
    }

    fn request(&mut self, mut number: u64) {
        if self.failed == Some(number) {
            number += 1;
        }
        let path = self.paths[(number % self.paths.len() as u64) as usize].clone();
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn_blocking(move || {
            let _ = tx.send(decode(&path));
        });
        self.pending = Some((number, rx));
    }

    fn collect_decoded(&mut self) {
        let Some((number, rx)) = &mut self.pending else {
            return;
        };
        let number = *number;
        match rx.try_recv() {
            Ok(Ok(image)) => {
                self.ready = Some((number, Arc::new(image)));
                self.pending = None;
            }
            Ok(Err(e)) => {
                // Keep presenting the previous frame
                tracing::warn!("{}", e);
                self.failed = Some(number);
                self.pending = None;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => self.pending = None,
        }
    }
}

impl VideoStream for SequenceStream {
    fn current_frame(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }

        let number = self.frame_number();
        self.collect_decoded();

        if let Some((ready, image)) = self.ready.take() {
            if ready > number {
                self.ready = Some((ready, image));
            } else if self.shown().map_or(true, |shown| ready > shown) {
                let frame = Frame::with_image(ready as f64 / self.fps, image);
                self.current = Some((ready, frame));
            }
        }

        if self.pending.is_none() && self.ready.is_none() {
            let shown = self.shown().unwrap_or(0);
            self.request(if shown < number { number } else { shown + 1 });
        }

        self.current.as_ref().map(|(_, frame)| frame.clone())
    }

    fn stop(&mut self) {
        if self.live {
            tracing::debug!("Frame sequence stopped");
        }
        self.live = false;
        self.current = None;
        self.pending = None;
        self.ready = None;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => {
            CaptureError::PermissionDenied(format!("{}: {}", dir.display(), e))
        }
        _ => CaptureError::DeviceAbsent(format!("{}: {}", dir.display(), e)),
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CaptureError::DeviceAbsent(format!(
            "no frames in {}",
            dir.display()
        )));
    }

    Ok(paths)
}

fn decode(path: &Path) -> Result<RgbaImage, CaptureError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| CaptureError::FrameDecode(format!("{}: {}", path.display(), e)))
}
