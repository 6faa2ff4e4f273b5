//! Landmark and detection result types.
//!
//! Coordinates follow the face-mesh convention: `x`/`y` normalized to the
//! frame (origin top-left, Y down), `z` a relative depth with smaller values
//! closer to the camera.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outer corner of the left eye (viewer's right on an unmirrored frame)
pub const LEFT_EYE_OUTER: usize = 33;

/// Outer corner of the right eye
pub const RIGHT_EYE_OUTER: usize = 263;

/// Top of the nose bridge, between the eyes
pub const NOSE_BRIDGE: usize = 168;

/// Smallest landmark set accepted as a face mesh (468 points, 478 with irises).
pub const MIN_LANDMARKS: usize = 455;

/// A single tracked facial point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// An immutable, index-addressable set of landmarks for one face.
///
/// Cloning is cheap; the points are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Arc<[Landmark]>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self {
            points: points.into(),
        }
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the set is long enough to be treated as a full face mesh
    pub fn is_complete(&self) -> bool {
        self.points.len() >= MIN_LANDMARKS
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.points.iter()
    }
}

impl FromIterator<Landmark> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Output of one detection call: zero or more faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub faces: Vec<LandmarkSet>,
}

impl DetectionResult {
    /// No face found
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(face: LandmarkSet) -> Self {
        Self { faces: vec![face] }
    }

    pub fn first_face(&self) -> Option<&LandmarkSet> {
        self.faces.first()
    }

    pub fn has_face(&self) -> bool {
        !self.faces.is_empty()
    }
}
