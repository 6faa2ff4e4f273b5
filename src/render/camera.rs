//! Orthographic overlay camera.

use glam::{Mat4, Vec3};

/// Orthographic camera looking down -Z at the origin.
///
/// Before calibration the view volume is the unit square; afterwards its
/// horizontal extent follows the video aspect ratio so that normalized
/// landmark coordinates map onto `[-aspect, aspect] x [-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl OrthographicCamera {
    pub fn unit(near: f32, far: f32, camera_z: f32) -> Self {
        Self::for_aspect(1.0, near, far, camera_z)
    }

    pub fn for_aspect(aspect: f32, near: f32, far: f32, camera_z: f32) -> Self {
        Self {
            left: -aspect,
            right: aspect,
            top: 1.0,
            bottom: -1.0,
            near,
            far,
            position: Vec3::new(0.0, 0.0, camera_z),
        }
    }

    pub fn aspect(&self) -> f32 {
        (self.right - self.left) / (self.top - self.bottom)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_bounds_map_to_clip_edges() {
        let camera = OrthographicCamera::for_aspect(16.0 / 9.0, 0.1, 100.0, 1.0);
        let vp = camera.view_projection();

        let right_edge = vp.project_point3(Vec3::new(16.0 / 9.0, 1.0, 0.0));
        assert!((right_edge.x - 1.0).abs() < 1e-5);
        assert!((right_edge.y - 1.0).abs() < 1e-5);

        let centre = vp.project_point3(Vec3::ZERO);
        assert!(centre.x.abs() < 1e-6 && centre.y.abs() < 1e-6);
        // Depth in [0, 1] for points between the planes
        assert!(centre.z > 0.0 && centre.z < 1.0);
    }

    #[test]
    fn test_unit_camera() {
        let camera = OrthographicCamera::unit(0.1, 100.0, 1.0);
        assert_eq!(camera.aspect(), 1.0);
        assert_eq!(camera.left, -1.0);
        assert_eq!(camera.right, 1.0);
    }
}
