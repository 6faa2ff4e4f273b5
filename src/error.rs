//! Error types for trylens

use thiserror::Error;

use crate::capture::SessionState;

/// Main error type for trylens
#[derive(Error, Debug)]
pub enum TrylensError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Capture device and session errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No capture device available: {0}")]
    DeviceAbsent(String),

    #[error("Permission to use the capture device was denied: {0}")]
    PermissionDenied(String),

    #[error("Capture constraints cannot be satisfied: {0}")]
    ConstraintsUnsatisfiable(String),

    #[error("Capture session is already {0}")]
    AlreadyRunning(SessionState),

    #[error("Capture start was cancelled by stop")]
    Cancelled,

    #[error("Failed to decode frame: {0}")]
    FrameDecode(String),
}

/// Landmark provider errors
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Landmark provider is not loaded yet")]
    ProviderUnavailable,

    #[error("Landmark provider warm-up failed: {0}")]
    WarmUp(String),

    #[error("Called {call} while provider is in {mode} mode")]
    WrongMode { call: &'static str, mode: String },

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Landmark recording parse error: {0}")]
    RecordingParse(String),
}

/// Overlay asset errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Model has no scene: {0}")]
    EmptyScene(String),

    #[error("Model load was abandoned before completing")]
    Aborted,
}

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write snapshot: {0}")]
    Snapshot(String),
}

/// Result type alias for trylens operations
pub type Result<T> = std::result::Result<T, TrylensError>;
