//! Landmark-to-pose resolution.
//!
//! Maps one face's landmarks to a rigid transform for the overlay: position
//! from the midpoint of the outer eye corners, uniform scale from their
//! horizontal distance, and in-plane rotation from the tilt of the eye line.
//! The transform is recomputed from scratch every time; there is no filter
//! state.
//!
//! Render space is the orthographic view used by the compositor: X spans
//! `[-aspect, aspect]`, Y spans `[-1, 1]` and grows upward, Z points toward
//! the camera.

use glam::{Quat, Vec3};

use crate::config::CalibrationConfig;
use crate::scene::Transform;
use crate::tracking::{DetectionResult, LandmarkSet, LEFT_EYE_OUTER, RIGHT_EYE_OUTER};

/// Position, uniform scale and in-plane rotation of the overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub scale: f32,
    /// Rotation about the view axis in radians
    pub rotation_z: f32,
}

impl Pose {
    pub fn transform(&self) -> Transform {
        Transform {
            translation: self.position,
            rotation: Quat::from_rotation_z(self.rotation_z),
            scale: Vec3::splat(self.scale),
        }
    }
}

/// Stateless mapping from landmarks to a [`Pose`]
#[derive(Debug, Clone, Default)]
pub struct PoseResolver {
    calibration: CalibrationConfig,
}

impl PoseResolver {
    pub fn new(calibration: CalibrationConfig) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &CalibrationConfig {
        &self.calibration
    }

    /// Pose for the first face of a detection, if any.
    pub fn resolve_detection(&self, result: &DetectionResult, aspect: f32) -> Option<Pose> {
        result
            .first_face()
            .and_then(|face| self.resolve(face, aspect))
    }

    /// Resolve a pose, or `None` for a truncated or non-finite landmark set
    /// or an uncalibrated aspect ratio.
    pub fn resolve(&self, landmarks: &LandmarkSet, aspect: f32) -> Option<Pose> {
        if !aspect.is_finite() || aspect <= 0.0 || !landmarks.is_complete() {
            return None;
        }

        let left = landmarks.get(LEFT_EYE_OUTER)?;
        let right = landmarks.get(RIGHT_EYE_OUTER)?;
        if !left.is_finite() || !right.is_finite() {
            return None;
        }

        let mid_x = (left.x + right.x) / 2.0;
        let mid_y = (left.y + right.y) / 2.0;
        let mid_z = (left.z + right.z) / 2.0;

        let c = &self.calibration;
        let position = Vec3::new(
            (mid_x - 0.5) * 2.0 * aspect + c.horizontal_offset,
            (0.5 - mid_y) * 2.0 + c.vertical_offset,
            -mid_z + c.depth_offset,
        );

        let scale = (right.x - left.x).abs() * aspect * c.scale_multiplier;
        let rotation_z = (right.y - left.y).atan2(right.x - left.x);

        Some(Pose {
            position,
            scale,
            rotation_z,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::face_with_eyes;
    use crate::tracking::{Landmark, MIN_LANDMARKS};

    fn no_offsets() -> PoseResolver {
        PoseResolver::new(CalibrationConfig {
            scale_multiplier: 2.2,
            vertical_offset: 0.0,
            horizontal_offset: 0.0,
            depth_offset: 0.0,
        })
    }

    #[test]
    fn test_symmetric_eyes_center_at_origin() {
        let face = face_with_eyes([0.3, 0.5, 0.0], [0.7, 0.5, 0.0]);
        let pose = no_offsets().resolve(&face, 1.0).unwrap();

        assert!(pose.position.x.abs() < 1e-6);
        assert!(pose.position.y.abs() < 1e-6);
        assert!(pose.position.z.abs() < 1e-6);
        assert!(pose.rotation_z.abs() < 1e-6);
    }

    #[test]
    fn test_axis_mapping() {
        // Eyes centred at (0.75, 0.25), depth -0.1, on a 16:9 frame
        let face = face_with_eyes([0.7, 0.25, -0.1], [0.8, 0.25, -0.1]);
        let aspect = 16.0 / 9.0;
        let pose = no_offsets().resolve(&face, aspect).unwrap();

        assert!((pose.position.x - 0.5 * aspect).abs() < 1e-5);
        // Image Y grows downward, render Y upward
        assert!((pose.position.y - 0.5).abs() < 1e-5);
        assert!((pose.position.z - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_default_offsets_applied() {
        let face = face_with_eyes([0.3, 0.5, 0.0], [0.7, 0.5, 0.0]);
        let pose = PoseResolver::default().resolve(&face, 1.0).unwrap();

        assert!(pose.position.x.abs() < 1e-6);
        assert!((pose.position.y + 0.05).abs() < 1e-6);
        assert!((pose.position.z - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_from_eye_tilt() {
        let face = face_with_eyes([0.3, 0.5, 0.0], [0.7, 0.6, 0.0]);
        let pose = no_offsets().resolve(&face, 1.0).unwrap();

        assert!((pose.rotation_z - 0.1f32.atan2(0.4)).abs() < 1e-6);
        assert!((pose.rotation_z - 0.2450).abs() < 1e-4);
    }

    #[test]
    fn test_scale_proportional_to_eye_distance() {
        let resolver = no_offsets();
        let narrow = resolver
            .resolve(&face_with_eyes([0.45, 0.5, 0.0], [0.55, 0.5, 0.0]), 1.5)
            .unwrap();
        let wide = resolver
            .resolve(&face_with_eyes([0.4, 0.5, 0.0], [0.6, 0.5, 0.0]), 1.5)
            .unwrap();

        assert!(narrow.scale > 0.0);
        assert!((wide.scale - 2.0 * narrow.scale).abs() < 1e-5);
        assert!((narrow.scale - 0.1 * 1.5 * 2.2).abs() < 1e-5);
    }

    #[test]
    fn test_scale_ignores_eye_order() {
        let resolver = no_offsets();
        let a = resolver
            .resolve(&face_with_eyes([0.3, 0.5, 0.0], [0.7, 0.5, 0.0]), 1.0)
            .unwrap();
        let b = resolver
            .resolve(&face_with_eyes([0.7, 0.5, 0.0], [0.3, 0.5, 0.0]), 1.0)
            .unwrap();
        assert_eq!(a.scale, b.scale);
    }

    #[test]
    fn test_truncated_set_rejected() {
        let short = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); MIN_LANDMARKS - 1]);
        assert!(no_offsets().resolve(&short, 1.0).is_none());
        assert!(no_offsets().resolve(&LandmarkSet::new(Vec::new()), 1.0).is_none());
    }

    #[test]
    fn test_uncalibrated_aspect_rejected() {
        let face = face_with_eyes([0.3, 0.5, 0.0], [0.7, 0.5, 0.0]);
        assert!(no_offsets().resolve(&face, 0.0).is_none());
        assert!(no_offsets().resolve(&face, f32::NAN).is_none());
    }

    #[test]
    fn test_non_finite_eye_rejected() {
        let face = face_with_eyes([f32::NAN, 0.5, 0.0], [0.7, 0.5, 0.0]);
        assert!(no_offsets().resolve(&face, 1.0).is_none());
    }

    #[test]
    fn test_no_face_resolves_to_none() {
        assert!(no_offsets()
            .resolve_detection(&DetectionResult::empty(), 1.0)
            .is_none());
    }

    #[test]
    fn test_pose_transform() {
        let pose = Pose {
            position: Vec3::new(0.1, 0.2, 0.3),
            scale: 0.5,
            rotation_z: std::f32::consts::FRAC_PI_2,
        };
        let m = pose.transform().matrix();
        let p = m.transform_point3(Vec3::X);
        // Scale, then rotate X onto Y, then translate
        assert!((p - Vec3::new(0.1, 0.7, 0.3)).length() < 1e-5);
    }
}
