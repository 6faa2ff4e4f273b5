//! Procedural geometry for the placeholder frame.

use glam::Vec3;
use std::f32::consts::TAU;

use super::node::Primitive;

/// Ring in the XY plane centred at the origin, facing +Z.
pub fn torus(
    radius: f32,
    tube: f32,
    radial_segments: u32,
    tubular_segments: u32,
    base_color: [f32; 4],
) -> Primitive {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);

    let mut positions = Vec::with_capacity(((radial + 1) * (tubular + 1)) as usize);
    let mut normals = Vec::with_capacity(positions.capacity());

    for j in 0..=radial {
        let v = j as f32 / radial as f32 * TAU;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * TAU;
            let ring = radius + tube * v.cos();
            let p = Vec3::new(ring * u.cos(), ring * u.sin(), tube * v.sin());
            let centre = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            positions.push(p);
            normals.push((p - centre).normalize_or_zero());
        }
    }

    let stride = tubular + 1;
    let mut indices = Vec::with_capacity((radial * tubular * 6) as usize);
    for j in 1..=radial {
        for i in 1..=tubular {
            let a = stride * j + i - 1;
            let b = stride * (j - 1) + i - 1;
            let c = stride * (j - 1) + i;
            let d = stride * j + i;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    Primitive {
        positions,
        normals,
        indices,
        base_color,
    }
}

/// Capped cylinder along the Y axis, centred at the origin.
pub fn cylinder(radius: f32, height: f32, radial_segments: u32, base_color: [f32; 4]) -> Primitive {
    let segments = radial_segments.max(3);
    let half = height / 2.0;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();

    // Side wall: top ring then bottom ring
    for y in [half, -half] {
        for x in 0..=segments {
            let theta = x as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            positions.push(Vec3::new(radius * sin, y, radius * cos));
            normals.push(Vec3::new(sin, 0.0, cos));
        }
    }
    let stride = segments + 1;
    for x in 0..segments {
        let a = x;
        let b = stride + x;
        let c = stride + x + 1;
        let d = x + 1;
        indices.extend_from_slice(&[a, b, d, b, c, d]);
    }

    // Caps
    for (y, normal) in [(half, Vec3::Y), (-half, Vec3::NEG_Y)] {
        let centre = positions.len() as u32;
        positions.push(Vec3::new(0.0, y, 0.0));
        normals.push(normal);
        for x in 0..=segments {
            let theta = x as f32 / segments as f32 * TAU;
            positions.push(Vec3::new(radius * theta.sin(), y, radius * theta.cos()));
            normals.push(normal);
        }
        for x in 0..segments {
            let rim = centre + 1 + x;
            if normal.y > 0.0 {
                indices.extend_from_slice(&[centre, rim, rim + 1]);
            } else {
                indices.extend_from_slice(&[centre, rim + 1, rim]);
            }
        }
    }

    Primitive {
        positions,
        normals,
        indices,
        base_color,
    }
}
