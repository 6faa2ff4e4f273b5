//! Frame scheduler: the per-refresh loop.
//!
//! Each tick applies a finished model load, polls the capture session,
//! calibrates the projection once per session, runs detection when the video
//! has advanced, then clears the 2D overlay, applies the latest pose and
//! renders. Nothing in a tick propagates an error; failures degrade to a
//! frozen pose.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::capture::{CaptureSession, Frame};
use crate::pose::{Pose, PoseResolver};
use crate::render::{Compositor, RenderBackend};
use crate::stage::AssetStage;
use crate::tracking::{DetectionResult, LandmarkProvider, LandmarkSet, RunningMode, Tracker};

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A detection call was made and its result accepted
    pub detected: bool,
    /// A fresh pose was resolved and applied to the model
    pub pose_applied: bool,
    pub rendered: bool,
    /// A detection completed after its session ended and was dropped
    pub discarded: bool,
}

/// Periodic composited PNG output
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub dir: PathBuf,
    /// Write every N ticks
    pub every: u64,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub refresh_hz: f32,
    pub max_ticks: Option<u64>,
    pub snapshot: Option<SnapshotOptions>,
}

enum Detection {
    Skipped,
    Accepted(DetectionResult),
    Discarded,
}

/// Drives detection, pose and rendering for one capture session handle.
pub struct FrameScheduler<P, B> {
    session: CaptureSession,
    tracker: Tracker<P>,
    stage: AssetStage,
    compositor: Compositor<B>,
    resolver: PoseResolver,
    clock: Instant,
    generation: u64,
    last_video_time: Option<f64>,
    last_pose: Option<Pose>,
    /// Face of the last accepted detection, redrawn after every overlay clear
    last_face: Option<LandmarkSet>,
    last_frame: Option<Frame>,
    warned_unavailable: bool,
    ticks: u64,
}

impl<P, B> FrameScheduler<P, B>
where
    P: LandmarkProvider + 'static,
    B: RenderBackend,
{
    pub fn new(
        session: CaptureSession,
        tracker: Tracker<P>,
        stage: AssetStage,
        compositor: Compositor<B>,
        resolver: PoseResolver,
    ) -> Self {
        let generation = session.generation();
        Self {
            session,
            tracker,
            stage,
            compositor,
            resolver,
            clock: Instant::now(),
            generation,
            last_video_time: None,
            last_pose: None,
            last_face: None,
            last_frame: None,
            warned_unavailable: false,
            ticks: 0,
        }
    }

    /// Run one iteration of the loop.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.ticks += 1;

        self.stage.poll();

        let generation = self.session.generation();
        if generation != self.generation {
            // New session: the first frame must be detected even if its
            // timestamp matches the last one seen
            self.generation = generation;
            self.last_video_time = None;
            self.last_face = None;
        }

        let frame = self.session.poll_frame();
        let calibration = self.session.calibration();
        if let Some(calibration) = &calibration {
            self.compositor.calibrate(generation, calibration);
        }

        let mut accepted = None;
        if let (Some(frame), Some(calibration)) = (&frame, calibration) {
            if self.session.is_active_generation(generation) {
                match self.detect(frame, generation).await {
                    Detection::Accepted(result) => {
                        report.detected = true;
                        accepted = Some((result, calibration.aspect));
                    }
                    Detection::Discarded => report.discarded = true,
                    Detection::Skipped => {}
                }
            }
        }

        self.compositor.clear_overlay();

        if let Some((result, aspect)) = accepted {
            self.last_face = result.first_face().cloned();
            match self.resolver.resolve_detection(&result, aspect) {
                Some(pose) => {
                    self.last_pose = Some(pose);
                    report.pose_applied = true;
                }
                None if result.has_face() => {
                    tracing::debug!("Malformed landmark set, keeping previous pose");
                }
                None => {}
            }
        }
        if let Some(face) = &self.last_face {
            self.compositor.draw_landmarks(face);
        }

        if self.session.is_active_generation(generation) {
            if let Some(pose) = &self.last_pose {
                self.stage.apply_pose(pose);
            }
        }

        self.compositor.render(self.stage.active_model());
        report.rendered = true;

        if frame.is_some() {
            self.last_frame = frame;
        }
        report
    }

    async fn detect(&mut self, frame: &Frame, generation: u64) -> Detection {
        let Some(provider) = self.tracker.provider_mut() else {
            if !self.warned_unavailable {
                tracing::warn!("Wait! Landmark provider not loaded yet");
                self.warned_unavailable = true;
            }
            return Detection::Skipped;
        };
        self.warned_unavailable = false;

        if provider.running_mode() == RunningMode::Image {
            tracing::debug!("Switching landmark provider to {} mode", RunningMode::Video);
            if let Err(e) = provider.set_running_mode(RunningMode::Video).await {
                tracing::warn!("{}", e);
                return Detection::Skipped;
            }
            if !self.session.is_active_generation(generation) {
                return Detection::Discarded;
            }
        }

        if self.last_video_time == Some(frame.timestamp) {
            return Detection::Skipped;
        }
        self.last_video_time = Some(frame.timestamp);

        let timestamp_ms = self.clock.elapsed().as_secs_f64() * 1000.0;
        let result = provider.detect_for_video(frame, timestamp_ms).await;

        if !self.session.is_active_generation(generation) {
            tracing::debug!("Discarding detection from ended session {}", generation);
            return Detection::Discarded;
        }

        match result {
            Ok(result) => Detection::Accepted(result),
            Err(e) => {
                tracing::warn!("Detection failed: {}", e);
                Detection::Skipped
            }
        }
    }

    /// Tick at `refresh_hz` until shutdown or `max_ticks`. Returns the number
    /// of ticks run.
    pub async fn run(&mut self, options: RunOptions, mut shutdown: broadcast::Receiver<()>) -> u64 {
        let hz = if options.refresh_hz.is_finite() && options.refresh_hz > 0.0 {
            options.refresh_hz
        } else {
            60.0
        };
        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / hz as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Frame scheduler running at {} Hz", hz);
        let mut ran = 0u64;

        loop {
            if options.max_ticks.is_some_and(|max| ran >= max) {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Frame scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                    ran += 1;
                    if let Some(snapshot) = &options.snapshot {
                        self.maybe_snapshot(snapshot, ran);
                    }
                }
            }
        }

        tracing::info!(
            "Frame scheduler stopped after {} ticks ({} frames rendered)",
            ran,
            self.compositor.frames_rendered()
        );
        ran
    }

    fn maybe_snapshot(&self, options: &SnapshotOptions, tick: u64) {
        if options.every == 0 || tick % options.every != 0 {
            return;
        }
        let Some(frame) = &self.last_frame else {
            return;
        };
        let path = options.dir.join(format!("frame_{:06}.png", tick));
        match self.compositor.save_snapshot(frame, &path) {
            Ok(()) => tracing::debug!("Wrote snapshot {}", path.display()),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn stage(&self) -> &AssetStage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut AssetStage {
        &mut self.stage
    }

    pub fn compositor(&self) -> &Compositor<B> {
        &self.compositor
    }

    pub fn last_pose(&self) -> Option<&Pose> {
        self.last_pose.as_ref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
