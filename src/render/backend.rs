//! Render backends.
//!
//! The compositor flattens the scene into [`DrawCall`]s, one per primitive,
//! each carrying its uniform block. A backend turns those into pixels.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use crate::config::RenderConfig;
use crate::scene::Primitive;

/// Per-draw uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Uniforms {
    pub mvp: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// Directions toward each light, world space (xyz, w unused)
    pub light_dir_0: [f32; 4],
    pub light_dir_1: [f32; 4],
    /// Colour premultiplied by intensity
    pub light_col_0: [f32; 4],
    pub light_col_1: [f32; 4],
    pub ambient: [f32; 4],
    pub base_color: [f32; 4],
}

struct DirectionalLight {
    /// Points from the target toward the light
    direction: Vec3,
    color_intensity: Vec4,
}

/// Scene lighting: white ambient plus a front and a back directional light.
pub struct Lighting {
    ambient: Vec4,
    lights: [DirectionalLight; 2],
}

impl Lighting {
    pub fn from_config(config: &RenderConfig) -> Self {
        let white = |intensity: f32| Vec4::new(intensity, intensity, intensity, 1.0);
        Self {
            ambient: white(config.ambient_intensity),
            lights: [
                DirectionalLight {
                    direction: Vec3::new(0.0, 0.0, 5.0).normalize(),
                    color_intensity: white(config.directional_intensity),
                },
                DirectionalLight {
                    direction: Vec3::new(0.0, 0.0, -5.0).normalize(),
                    color_intensity: white(config.directional_intensity),
                },
            ],
        }
    }

    pub fn uniforms(&self, view_projection: Mat4, model: Mat4, base_color: [f32; 4]) -> Uniforms {
        Uniforms {
            mvp: (view_projection * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            light_dir_0: self.lights[0].direction.extend(0.0).to_array(),
            light_dir_1: self.lights[1].direction.extend(0.0).to_array(),
            light_col_0: self.lights[0].color_intensity.to_array(),
            light_col_1: self.lights[1].color_intensity.to_array(),
            ambient: self.ambient.to_array(),
            base_color,
        }
    }
}

/// One primitive to draw with its uniforms
pub struct DrawCall<'a> {
    pub primitive: &'a Primitive,
    pub uniforms: Uniforms,
}

/// A render target the compositor submits frames to.
pub trait RenderBackend: Send {
    /// Resize the target to the video resolution.
    fn resize(&mut self, width: u32, height: u32);

    /// Start a frame, clearing colour to `clear` and resetting depth.
    fn begin_frame(&mut self, clear: [f32; 4]);

    fn draw(&mut self, call: &DrawCall<'_>);

    fn end_frame(&mut self);

    /// The rendered pixels, when the backend keeps them on the CPU.
    fn target(&self) -> Option<&RgbaImage> {
        None
    }
}

/// CPU backend that splats projected vertices into an image with a depth
/// test and Lambert shading.
pub struct SoftwareBackend {
    color: RgbaImage,
    depth: Vec<f32>,
    points: usize,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            color: RgbaImage::new(width, height),
            depth: vec![f32::INFINITY; (width * height) as usize],
            points: 0,
        }
    }

    /// Points written in the current frame
    pub fn points_drawn(&self) -> usize {
        self.points
    }

    fn shade(uniforms: &Uniforms, normal: Vec3) -> [u8; 4] {
        let base = Vec4::from_array(uniforms.base_color);
        let mut light = Vec4::from_array(uniforms.ambient).truncate();
        for (dir, col) in [
            (uniforms.light_dir_0, uniforms.light_col_0),
            (uniforms.light_dir_1, uniforms.light_col_1),
        ] {
            let lambert = normal.dot(Vec4::from_array(dir).truncate()).max(0.0);
            light += Vec4::from_array(col).truncate() * lambert;
        }
        // Light and colour are linear; clamp into the 8-bit target
        let rgb = (base.truncate() * light).clamp(Vec3::ZERO, Vec3::ONE);
        let a = base.w.clamp(0.0, 1.0);
        [
            (rgb.x * 255.0).round() as u8,
            (rgb.y * 255.0).round() as u8,
            (rgb.z * 255.0).round() as u8,
            (a * 255.0).round() as u8,
        ]
    }
}

impl RenderBackend for SoftwareBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.color.dimensions() || width == 0 || height == 0 {
            return;
        }
        self.color = RgbaImage::new(width, height);
        self.depth = vec![f32::INFINITY; (width * height) as usize];
    }

    fn begin_frame(&mut self, clear: [f32; 4]) {
        let px = Rgba(clear.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
        for pixel in self.color.pixels_mut() {
            *pixel = px;
        }
        self.depth.fill(f32::INFINITY);
        self.points = 0;
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let mvp = Mat4::from_cols_array_2d(&call.uniforms.mvp);
        let model = Mat4::from_cols_array_2d(&call.uniforms.model);
        let (width, height) = self.color.dimensions();

        let prim = call.primitive;
        for (i, position) in prim.positions.iter().enumerate() {
            let clip = mvp * position.extend(1.0);
            if clip.w.abs() < f32::EPSILON {
                continue;
            }
            let ndc = clip.truncate() / clip.w;
            if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
                continue;
            }

            let x = (((ndc.x + 1.0) * 0.5 * width as f32) as u32).min(width - 1);
            let y = (((1.0 - ndc.y) * 0.5 * height as f32) as u32).min(height - 1);
            let idx = (y * width + x) as usize;
            if ndc.z >= self.depth[idx] {
                continue;
            }
            self.depth[idx] = ndc.z;

            let normal = prim
                .normals
                .get(i)
                .map(|n| model.transform_vector3(*n).normalize_or_zero())
                .unwrap_or(Vec3::Z);
            self.color.put_pixel(x, y, Rgba(Self::shade(&call.uniforms, normal)));
            self.points += 1;
        }
    }

    fn end_frame(&mut self) {}

    fn target(&self) -> Option<&RgbaImage> {
        Some(&self.color)
    }
}
