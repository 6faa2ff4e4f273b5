//! Configuration parsing and management for trylens

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, TrylensError};
use crate::tracking::Delegate;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub tracking: TrackingConfig,
    pub calibration: CalibrationConfig,
    pub asset: AssetConfig,
    pub render: RenderConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrylensError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, TrylensError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, TrylensError> {
        let paths = [
            PathBuf::from("trylens.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TrylensError> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(invalid("capture.width/height", "Capture dimensions must be non-zero"));
        }

        if !self.capture.fps.is_finite() || self.capture.fps <= 0.0 {
            return Err(invalid("capture.fps", "Frame rate must be greater than 0"));
        }

        if self.tracking.max_faces == 0 {
            return Err(invalid("tracking.max_faces", "At least one face must be tracked"));
        }
        if self.tracking.max_faces > 1 {
            tracing::warn!(
                "tracking.max_faces = {} but only the first face drives the overlay",
                self.tracking.max_faces
            );
        }

        let multiplier = self.calibration.scale_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(invalid(
                "calibration.scale_multiplier",
                "Scale multiplier must be a positive number",
            ));
        }

        let offsets = [
            self.calibration.horizontal_offset,
            self.calibration.vertical_offset,
            self.calibration.depth_offset,
        ];
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(invalid("calibration", "Offsets must be finite"));
        }

        if self.render.near.is_nan()
            || self.render.far.is_nan()
            || self.render.near >= self.render.far
        {
            return Err(invalid("render.near", "Near plane must be in front of the far plane"));
        }

        if !self.scheduler.refresh_hz.is_finite() || self.scheduler.refresh_hz <= 0.0 {
            return Err(invalid("scheduler.refresh_hz", "Refresh rate must be greater than 0"));
        }

        if !self.asset.model_path().exists() {
            tracing::warn!(
                "Overlay model not found at {}; the placeholder will stay active",
                self.asset.model_path().display()
            );
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> TrylensError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Video capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory of recorded frames played back as the video source
    pub frames_dir: PathBuf,
    /// Playback frame rate
    pub fps: f32,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Fail acquisition when the device cannot deliver exactly width x height
    pub exact: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("recording/frames"),
            fps: 30.0,
            width: 1280,
            height: 720,
            exact: false,
        }
    }
}

/// Landmark provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// JSON-lines landmark recording answered by the replay provider
    pub recording: PathBuf,
    /// Inference delegate requested from the provider
    pub delegate: Delegate,
    /// Maximum number of faces reported per detection
    pub max_faces: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            recording: PathBuf::from("recording/landmarks.jsonl"),
            delegate: Delegate::Gpu,
            max_faces: 1,
        }
    }
}

/// Fixed calibration constants applied when mapping landmarks to a pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Multiplier from eye distance (render units) to model scale
    pub scale_multiplier: f32,
    /// Added to the render-space Y of the eye centre
    pub vertical_offset: f32,
    /// Added to the render-space X of the eye centre
    pub horizontal_offset: f32,
    /// Added to the negated landmark depth
    pub depth_offset: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            scale_multiplier: 2.2,
            vertical_offset: -0.05,
            horizontal_offset: 0.0,
            depth_offset: 0.3,
        }
    }
}

/// Overlay asset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory containing overlay assets
    pub assets_dir: PathBuf,
    /// Model file, relative to `assets_dir`
    pub model: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            model: "Glass/scene.gltf".to_string(),
        }
    }
}

impl AssetConfig {
    /// Absolute path of the final model
    pub fn model_path(&self) -> PathBuf {
        let base_dir = if self.assets_dir.is_absolute() {
            self.assets_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.assets_dir)
        };
        base_dir.join(&self.model)
    }
}

/// Compositor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Orthographic near plane
    pub near: f32,
    /// Orthographic far plane
    pub far: f32,
    /// Camera distance along +Z
    pub camera_z: f32,
    /// Ambient light intensity (white)
    pub ambient_intensity: f32,
    /// Intensity of the front and back directional lights (white)
    pub directional_intensity: f32,
    /// Mark the eye anchors on the 2D overlay surface
    pub debug_landmarks: bool,
    /// Write composited PNG snapshots here
    pub snapshot_dir: Option<PathBuf>,
    /// Snapshot every N ticks (0 disables)
    pub snapshot_every: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 100.0,
            camera_z: 1.0,
            ambient_intensity: 3.0,
            directional_intensity: 2.0,
            debug_landmarks: false,
            snapshot_dir: None,
            snapshot_every: 0,
        }
    }
}

/// Frame scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Display refresh rate driving the loop
    pub refresh_hz: f32,
    /// Stop after this many ticks (headless batch runs)
    pub max_ticks: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            max_ticks: None,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("trylens");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/trylens");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/trylens");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("trylens");
        }
    }

    PathBuf::from(".")
}
