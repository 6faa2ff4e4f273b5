//! Scene graph nodes.
//!
//! A scene is a tree of [`SceneNode`]s. Groups only carry a transform and
//! children; meshes carry renderable primitives. World matrices are composed
//! parent-first during traversal.

use glam::{Mat4, Quat, Vec3};

/// Local translation, rotation and scale of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Indexed triangle geometry with a flat material colour.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Base colour factor (RGBA, linear)
    pub base_color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub transform: Transform,
    pub visible: bool,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn new(primitives: Vec<Primitive>) -> Self {
        Self {
            name: None,
            transform: Transform::IDENTITY,
            visible: true,
            primitives,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: Option<String>,
    pub transform: Transform,
    pub visible: bool,
    pub children: Vec<SceneNode>,
}

impl Group {
    pub fn new(children: Vec<SceneNode>) -> Self {
        Self {
            name: None,
            transform: Transform::IDENTITY,
            visible: true,
            children,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A node in the overlay scene graph
#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Mesh(Mesh),
    Group(Group),
}

impl From<Mesh> for SceneNode {
    fn from(mesh: Mesh) -> Self {
        Self::Mesh(mesh)
    }
}

impl From<Group> for SceneNode {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

impl SceneNode {
    pub fn transform(&self) -> &Transform {
        match self {
            Self::Mesh(m) => &m.transform,
            Self::Group(g) => &g.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        match self {
            Self::Mesh(m) => &mut m.transform,
            Self::Group(g) => &mut g.transform,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Self::Mesh(m) => m.visible,
            Self::Group(g) => g.visible,
        }
    }

    /// Visit every visible mesh with its world matrix. Invisible nodes hide
    /// their whole subtree.
    pub fn walk<F>(&self, parent: Mat4, f: &mut F)
    where
        F: FnMut(&Mesh, Mat4),
    {
        if !self.is_visible() {
            return;
        }
        let world = parent * self.transform().matrix();
        match self {
            Self::Mesh(mesh) => f(mesh, world),
            Self::Group(group) => {
                for child in &group.children {
                    child.walk(world, f);
                }
            }
        }
    }

    /// Visit every mesh in the subtree regardless of visibility.
    pub fn visit_meshes_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Mesh),
    {
        match self {
            Self::Mesh(mesh) => f(mesh),
            Self::Group(group) => {
                for child in &mut group.children {
                    child.visit_meshes_mut(f);
                }
            }
        }
    }

    pub fn mesh_count(&self) -> usize {
        match self {
            Self::Mesh(_) => 1,
            Self::Group(group) => group.children.iter().map(SceneNode::mesh_count).sum(),
        }
    }

    /// Bounds of all geometry in the subtree, in the space of this node's
    /// parent. Hidden meshes are included.
    pub fn bounding_box(&self) -> Option<Aabb> {
        self.bounds_in(Mat4::IDENTITY)
    }

    fn bounds_in(&self, parent: Mat4) -> Option<Aabb> {
        let world = parent * self.transform().matrix();
        match self {
            Self::Mesh(mesh) => mesh
                .primitives
                .iter()
                .flat_map(|p| p.positions.iter())
                .map(|p| world.transform_point3(*p))
                .fold(None, |acc: Option<Aabb>, p| {
                    Some(match acc {
                        Some(b) => b.including(p),
                        None => Aabb::point(p),
                    })
                }),
            Self::Group(group) => group
                .children
                .iter()
                .filter_map(|child| child.bounds_in(world))
                .reduce(|a, b| a.union(&b)),
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn including(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}
