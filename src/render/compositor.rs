//! Compositor: projection, 2D overlay surface and per-tick rendering.

use glam::Mat4;
use image::{imageops, Rgba, RgbaImage};
use std::path::Path;

use crate::capture::{Calibration, Frame};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::stage::OverlayModel;
use crate::tracking::{LandmarkSet, LEFT_EYE_OUTER, NOSE_BRIDGE, RIGHT_EYE_OUTER};

use super::backend::{DrawCall, Lighting, RenderBackend};
use super::camera::OrthographicCamera;

/// Transparent clear colour so the video shows through
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

const MARK_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// 2D annotation layer sized to the video, cleared every tick.
pub struct OverlaySurface {
    image: RgbaImage,
    clears: u64,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width.max(1), height.max(1)),
            clears: 0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && (width, height) != self.image.dimensions() {
            self.image = RgbaImage::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.clears += 1;
    }

    /// Number of clears since creation
    pub fn clear_count(&self) -> u64 {
        self.clears
    }

    /// Draw a small square dot at normalized image coordinates.
    pub fn mark(&mut self, x: f32, y: f32, color: Rgba<u8>) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let (width, height) = self.image.dimensions();
        let cx = (x * width as f32).round() as i64;
        let cy = (y * height as f32).round() as i64;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (px, py) = (cx + dx, cy + dy);
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    self.image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Owns the render backend and the overlay camera.
pub struct Compositor<B> {
    backend: B,
    camera: OrthographicCamera,
    lighting: Lighting,
    config: RenderConfig,
    overlay: OverlaySurface,
    calibrated_generation: Option<u64>,
    frames_rendered: u64,
}

impl<B: RenderBackend> Compositor<B> {
    pub fn new(backend: B, config: &RenderConfig) -> Self {
        Self {
            backend,
            camera: OrthographicCamera::unit(config.near, config.far, config.camera_z),
            lighting: Lighting::from_config(config),
            config: config.clone(),
            overlay: OverlaySurface::new(1, 1),
            calibrated_generation: None,
            frames_rendered: 0,
        }
    }

    /// Replace the camera for a session's calibration. Only the first call per
    /// session generation has an effect; returns whether it did.
    pub fn calibrate(&mut self, generation: u64, calibration: &Calibration) -> bool {
        if self.calibrated_generation == Some(generation) {
            return false;
        }

        self.camera = OrthographicCamera::for_aspect(
            calibration.aspect,
            self.config.near,
            self.config.far,
            self.config.camera_z,
        );
        self.backend.resize(calibration.width, calibration.height);
        self.overlay.resize(calibration.width, calibration.height);
        self.calibrated_generation = Some(generation);

        tracing::info!(
            "Projection calibrated for session {}: {}x{}, aspect {:.3}",
            generation,
            calibration.width,
            calibration.height,
            calibration.aspect
        );
        true
    }

    pub fn camera(&self) -> &OrthographicCamera {
        &self.camera
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.clear();
    }

    pub fn overlay(&self) -> &OverlaySurface {
        &self.overlay
    }

    /// Mark the pose anchors on the overlay surface when enabled.
    pub fn draw_landmarks(&mut self, landmarks: &LandmarkSet) {
        if !self.config.debug_landmarks {
            return;
        }
        for index in [LEFT_EYE_OUTER, RIGHT_EYE_OUTER, NOSE_BRIDGE] {
            if let Some(lm) = landmarks.get(index) {
                self.overlay.mark(lm.x, lm.y, MARK_COLOR);
            }
        }
    }

    /// Draw the model: one draw call per primitive of every visible mesh.
    pub fn render(&mut self, model: &OverlayModel) {
        let view_projection = self.camera.view_projection();
        let lighting = &self.lighting;
        let backend = &mut self.backend;

        backend.begin_frame(CLEAR_COLOR);
        model.root().walk(Mat4::IDENTITY, &mut |mesh, world| {
            for primitive in &mesh.primitives {
                let call = DrawCall {
                    primitive,
                    uniforms: lighting.uniforms(view_projection, world, primitive.base_color),
                };
                backend.draw(&call);
            }
        });
        backend.end_frame();

        self.frames_rendered += 1;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Video frame with the rendered overlay and the 2D surface on top.
    pub fn compose_snapshot(&self, frame: &Frame) -> RgbaImage {
        let mut out = match &frame.image {
            Some(image) => image.as_ref().clone(),
            None => RgbaImage::new(frame.width.max(1), frame.height.max(1)),
        };
        if let Some(target) = self.backend.target() {
            overlay_fitted(&mut out, target);
        }
        overlay_fitted(&mut out, self.overlay.image());
        out
    }

    pub fn save_snapshot(&self, frame: &Frame, path: &Path) -> Result<(), RenderError> {
        self.compose_snapshot(frame)
            .save(path)
            .map_err(|e| RenderError::Snapshot(format!("{}: {}", path.display(), e)))
    }
}

/// Alpha-blend `layer` over `base`, stretching it when the sizes differ.
fn overlay_fitted(base: &mut RgbaImage, layer: &RgbaImage) {
    if layer.dimensions() == base.dimensions() {
        imageops::overlay(base, layer, 0, 0);
    } else {
        let resized = imageops::resize(
            layer,
            base.width(),
            base.height(),
            imageops::FilterType::Nearest,
        );
        imageops::overlay(base, &resized, 0, 0);
    }
}
