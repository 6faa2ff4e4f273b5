//! Replay landmark provider
//!
//! Answers detections from a JSON-lines recording captured alongside a frame
//! sequence. Each line is one detection keyed by the video playback time:
//!
//! ```text
//! {"timestamp": 0.033, "face_detected": true, "landmarks": [[0.31, 0.42, -0.02], ...]}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::capture::Frame;
use crate::error::TrackingError;

use super::landmarks::{DetectionResult, Landmark};
use super::provider::{LandmarkProvider, LandmarkProviderFactory, ProviderOptions, RunningMode};

/// Slack when matching a frame's playback time to a recorded timestamp
const TIMESTAMP_EPSILON: f64 = 1e-6;

/// A single recorded detection
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedDetection {
    /// Video playback time in seconds
    pub timestamp: f64,
    /// Whether a face was detected on this frame
    #[serde(default = "default_true")]
    pub face_detected: bool,
    /// Face mesh points as [x, y, z]
    #[serde(default)]
    pub landmarks: Vec<[f32; 3]>,
}

fn default_true() -> bool {
    true
}

impl RecordedDetection {
    pub fn to_result(&self) -> DetectionResult {
        if !self.face_detected || self.landmarks.is_empty() {
            return DetectionResult::empty();
        }
        DetectionResult::single(self.landmarks.iter().copied().map(Landmark::from).collect())
    }
}

/// Landmark provider backed by a recording
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    records: Vec<RecordedDetection>,
    mode: RunningMode,
    max_faces: usize,
}

impl ReplayProvider {
    pub fn from_records(mut records: Vec<RecordedDetection>, options: &ProviderOptions) -> Self {
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            records,
            mode: options.running_mode,
            max_faces: options.max_faces.max(1) as usize,
        }
    }

    /// Parse a JSON-lines recording
    pub fn parse(contents: &str, options: &ProviderOptions) -> Result<Self, TrackingError> {
        let mut records = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: RecordedDetection = serde_json::from_str(line).map_err(|e| {
                TrackingError::RecordingParse(format!("line {}: {}", line_no + 1, e))
            })?;
            records.push(record);
        }

        Ok(Self::from_records(records, options))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Latest record at or before `time`
    fn lookup(&self, time: f64) -> Option<&RecordedDetection> {
        let idx = self
            .records
            .partition_point(|r| r.timestamp <= time + TIMESTAMP_EPSILON);
        idx.checked_sub(1).map(|i| &self.records[i])
    }

    fn answer(&self, frame: &Frame) -> DetectionResult {
        let mut result = self
            .lookup(frame.timestamp)
            .map(RecordedDetection::to_result)
            .unwrap_or_default();
        result.faces.truncate(self.max_faces);
        result
    }
}

impl LandmarkProvider for ReplayProvider {
    fn running_mode(&self) -> RunningMode {
        self.mode
    }

    fn set_running_mode(
        &mut self,
        mode: RunningMode,
    ) -> impl Future<Output = Result<(), TrackingError>> + Send {
        tracing::debug!("Replay provider switching {} -> {}", self.mode, mode);
        self.mode = mode;
        async { Ok(()) }
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, TrackingError> {
        if self.mode != RunningMode::Image {
            return Err(TrackingError::WrongMode {
                call: "detect",
                mode: self.mode.to_string(),
            });
        }
        Ok(self.answer(frame))
    }

    fn detect_for_video(
        &mut self,
        frame: &Frame,
        _timestamp_ms: f64,
    ) -> impl Future<Output = Result<DetectionResult, TrackingError>> + Send {
        let result = if self.mode != RunningMode::Video {
            Err(TrackingError::WrongMode {
                call: "detect_for_video",
                mode: self.mode.to_string(),
            })
        } else {
            Ok(self.answer(frame))
        };
        async move { result }
    }
}

/// Warm-up for [`ReplayProvider`]: reads the recording from disk.
#[derive(Debug, Clone)]
pub struct ReplayFactory {
    path: PathBuf,
}

impl ReplayFactory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl LandmarkProviderFactory for ReplayFactory {
    type Provider = ReplayProvider;

    fn create_from_options(
        self,
        options: ProviderOptions,
    ) -> impl Future<Output = Result<ReplayProvider, TrackingError>> + Send {
        async move {
            let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                TrackingError::WarmUp(format!("{}: {}", self.path.display(), e))
            })?;
            let provider = ReplayProvider::parse(&contents, &options)?;
            tracing::info!(
                "Loaded {} recorded detections from {}",
                provider.len(),
                self.path.display()
            );
            Ok(provider)
        }
    }
}
