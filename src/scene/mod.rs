//! Scene module
//!
//! Scene graph types, procedural placeholder geometry and the glTF loader.

pub mod loader;
pub mod node;
pub mod primitives;

pub use loader::{AssetLoader, GltfLoader};
pub use node::{Aabb, Group, Mesh, Primitive, SceneNode, Transform};
