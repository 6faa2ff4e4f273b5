//! Overlay model loading.
//!
//! Loads a glTF (`.gltf` or `.glb`) scene into a [`SceneNode`] tree. Node
//! hierarchy and local transforms are preserved; each primitive keeps its
//! material's base colour factor. Textures are ignored.

use glam::{Quat, Vec3};
use std::future::Future;
use std::path::Path;
use tokio::sync::watch;

use crate::error::AssetError;

use super::node::{Group, Mesh, Primitive, SceneNode, Transform};

/// Asynchronous source of overlay models.
pub trait AssetLoader: Send + Sync + 'static {
    /// Load the model at `path`, reporting progress fractions in `[0, 1]`.
    fn load(
        &self,
        path: &Path,
        progress: watch::Sender<f32>,
    ) -> impl Future<Output = Result<SceneNode, AssetError>> + Send;
}

/// glTF loader using the `gltf` crate on a blocking task
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load(
        &self,
        path: &Path,
        progress: watch::Sender<f32>,
    ) -> impl Future<Output = Result<SceneNode, AssetError>> + Send {
        let path = path.to_path_buf();
        async move {
            if tokio::fs::metadata(&path).await.is_err() {
                return Err(AssetError::NotFound(path.display().to_string()));
            }
            progress.send_replace(0.0);

            tokio::task::spawn_blocking(move || import_scene(&path, &progress))
                .await
                .map_err(|e| AssetError::Load(format!("loader task failed: {}", e)))?
        }
    }
}

fn import_scene(path: &Path, progress: &watch::Sender<f32>) -> Result<SceneNode, AssetError> {
    let (document, buffers, _images) = gltf::import(path)
        .map_err(|e| AssetError::Load(format!("{}: {}", path.display(), e)))?;
    progress.send_replace(0.5);

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::EmptyScene(path.display().to_string()))?;

    let children: Vec<SceneNode> = scene
        .nodes()
        .map(|node| convert_node(&node, &buffers))
        .collect();

    let mut root = Group::new(children);
    root.name = scene.name().map(str::to_string);
    let root = SceneNode::Group(root);

    if root.mesh_count() == 0 {
        return Err(AssetError::EmptyScene(path.display().to_string()));
    }

    tracing::debug!(
        "Loaded {} ({} meshes)",
        path.display(),
        root.mesh_count()
    );
    progress.send_replace(1.0);
    Ok(root)
}

fn convert_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> SceneNode {
    let (t, r, s) = node.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from(s),
    };
    let name = node.name().map(str::to_string);

    let mesh = node.mesh().map(|mesh| Mesh::new(read_primitives(&mesh, buffers)));
    let children: Vec<SceneNode> = node
        .children()
        .map(|child| convert_node(&child, buffers))
        .collect();

    match (mesh, children.is_empty()) {
        (Some(mut mesh), true) => {
            mesh.name = name;
            mesh.transform = transform;
            SceneNode::Mesh(mesh)
        }
        (mesh, _) => {
            // Mesh nodes with children become a group holding the mesh first
            let mut all = Vec::with_capacity(children.len() + 1);
            all.extend(mesh.map(SceneNode::Mesh));
            all.extend(children);
            SceneNode::Group(Group {
                name,
                transform,
                visible: true,
                children: all,
            })
        }
    }
}

fn read_primitives(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Vec<Primitive> {
    let mut primitives = Vec::new();

    for prim in mesh.primitives() {
        if prim.mode() != gltf::mesh::Mode::Triangles {
            tracing::debug!("Skipping non-triangle primitive {:?}", prim.mode());
            continue;
        }
        let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .map(|iter| iter.map(Vec3::from).collect())
            .unwrap_or_default();
        if positions.is_empty() {
            continue;
        }

        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|iter| iter.map(Vec3::from).collect())
            .unwrap_or_else(|| vec![Vec3::Z; positions.len()]);

        let indices: Vec<u32> = reader
            .read_indices()
            .map(|iter| iter.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());

        let base_color = prim.material().pbr_metallic_roughness().base_color_factor();

        primitives.push(Primitive {
            positions,
            normals,
            indices,
            base_color,
        });
    }

    primitives
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// One red triangle at (0,0,0) (1,0,0) (0,1,0), offset by +2 on X.
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "name": "Glasses", "nodes": [0] }],
        "nodes": [{ "name": "Frame", "mesh": 0, "translation": [2.0, 0.0, 0.0] }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] }],
        "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] } }],
        "buffers": [{
            "byteLength": 44,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA="
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    #[tokio::test]
    async fn test_load_gltf_triangle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.gltf");
        std::fs::write(&path, TRIANGLE_GLTF).unwrap();

        let (tx, rx) = watch::channel(0.0);
        let root = GltfLoader.load(&path, tx).await.unwrap();

        assert_eq!(*rx.borrow(), 1.0);
        assert_eq!(root.mesh_count(), 1);

        let SceneNode::Group(group) = &root else {
            panic!("expected a root group");
        };
        assert_eq!(group.name.as_deref(), Some("Glasses"));

        let SceneNode::Mesh(mesh) = &group.children[0] else {
            panic!("expected a mesh");
        };
        assert_eq!(mesh.name.as_deref(), Some("Frame"));
        assert_eq!(mesh.transform.translation, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(mesh.primitives[0].indices, vec![0, 1, 2]);
        assert_eq!(mesh.primitives[0].base_color, [1.0, 0.0, 0.0, 1.0]);

        let bounds = root.bounding_box().unwrap();
        assert_eq!(bounds.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 1.0, 0.0));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = watch::channel(0.0);
        let result = GltfLoader.load(&dir.path().join("missing.glb"), tx).await;
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.gltf");
        std::fs::write(&path, "{ not gltf").unwrap();

        let (tx, _rx) = watch::channel(0.0);
        let result = GltfLoader.load(&path, tx).await;
        assert!(matches!(result, Err(AssetError::Load(_))));
    }
}
