//! Render module
//!
//! Orthographic overlay camera, backend abstraction with a CPU software
//! backend, and the compositor that ties them to the overlay model.

pub mod backend;
pub mod camera;
pub mod compositor;

pub use backend::{DrawCall, Lighting, RenderBackend, SoftwareBackend, Uniforms};
pub use camera::OrthographicCamera;
pub use compositor::{Compositor, OverlaySurface};
