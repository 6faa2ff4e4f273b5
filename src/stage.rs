//! Asset stage: owns the overlay model shown to the compositor.
//!
//! The stage starts with a procedural placeholder and swaps in the loaded
//! model once its asynchronous load completes. The swap happens in
//! [`AssetStage::poll`] on the caller's task as a single assignment, so there
//! is never a tick without an active model.

use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use crate::error::AssetError;
use crate::pose::Pose;
use crate::scene::primitives::{cylinder, torus};
use crate::scene::{AssetLoader, Group, Mesh, SceneNode, Transform};

/// Placeholder frame colour (0x0000ff)
const PLACEHOLDER_COLOR: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// Horizontal offset of each placeholder lens from the bridge centre
const PLACEHOLDER_LENS_OFFSET: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    Placeholder,
    Final,
}

/// The model currently attached to the scene, wrapped in a root group that
/// receives the face pose.
#[derive(Debug, Clone)]
pub struct OverlayModel {
    root: SceneNode,
    variant: ModelVariant,
}

impl OverlayModel {
    /// Synthetic glasses: a blue bridge between two ring lenses.
    pub fn placeholder() -> Self {
        let bridge = Mesh::new(vec![cylinder(0.01, 0.24, 8, PLACEHOLDER_COLOR)])
            .named("bridge")
            .with_transform(Transform {
                rotation: Quat::from_rotation_z(FRAC_PI_2),
                ..Transform::IDENTITY
            });

        let lens = |name: &str, x: f32| {
            Mesh::new(vec![torus(0.08, 0.01, 16, 32, PLACEHOLDER_COLOR)])
                .named(name)
                .with_transform(Transform::from_translation(Vec3::new(x, 0.0, 0.0)))
        };

        let root = Group::new(vec![
            bridge.into(),
            lens("lens_left", -PLACEHOLDER_LENS_OFFSET).into(),
            lens("lens_right", PLACEHOLDER_LENS_OFFSET).into(),
        ])
        .named("placeholder");

        Self {
            root: root.into(),
            variant: ModelVariant::Placeholder,
        }
    }

    /// Prepare a loaded scene: centre its bounds on the origin, force every
    /// mesh visible and wrap it in a fresh root group.
    pub fn from_loaded(mut scene: SceneNode) -> Self {
        if let Some(bounds) = scene.bounding_box() {
            scene.transform_mut().translation -= bounds.center();
        }
        scene.visit_meshes_mut(&mut |mesh| mesh.visible = true);

        Self {
            root: Group::new(vec![scene]).named("overlay").into(),
            variant: ModelVariant::Final,
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn transform(&self) -> &Transform {
        self.root.transform()
    }

    pub fn set_transform(&mut self, transform: Transform) {
        *self.root.transform_mut() = transform;
    }
}

/// Outcome of the final-model load, reported exactly once
#[derive(Debug)]
pub enum StageEvent {
    Attached,
    Failed(AssetError),
}

enum LoadState {
    NotStarted,
    Pending(oneshot::Receiver<Result<SceneNode, AssetError>>),
    Attached,
    Failed,
}

/// Holds the active overlay model and drives the final-model load.
pub struct AssetStage {
    active: OverlayModel,
    load: LoadState,
    progress: Option<watch::Receiver<f32>>,
}

impl Default for AssetStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStage {
    pub fn new() -> Self {
        Self {
            active: OverlayModel::placeholder(),
            load: LoadState::NotStarted,
            progress: None,
        }
    }

    /// Begin loading the final model on the runtime.
    ///
    /// Returns false (and does nothing) when a load is already pending or has
    /// finished. Must be called from within a tokio runtime.
    pub fn load_final<L: AssetLoader>(&mut self, loader: Arc<L>, path: impl Into<PathBuf>) -> bool {
        if !matches!(self.load, LoadState::NotStarted) {
            tracing::debug!("Overlay model load already requested");
            return false;
        }

        let path = path.into();
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let (tx, rx) = oneshot::channel();

        tracing::info!("Loading overlay model from {}", path.display());
        tokio::spawn(async move {
            let result = loader.load(&path, progress_tx).await;
            let _ = tx.send(result);
        });

        self.load = LoadState::Pending(rx);
        self.progress = Some(progress_rx);
        true
    }

    /// Apply a completed load, if any. Never blocks.
    pub fn poll(&mut self) -> Option<StageEvent> {
        self.log_progress();

        let LoadState::Pending(rx) = &mut self.load else {
            return None;
        };
        match rx.try_recv() {
            Ok(result) => Some(self.finish(result)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(self.finish(Err(AssetError::Aborted)))
            }
        }
    }

    /// Wait for a pending load to complete and apply it. Returns `None` when
    /// no load is pending.
    pub async fn wait_loaded(&mut self) -> Option<StageEvent> {
        let LoadState::Pending(rx) = &mut self.load else {
            return None;
        };
        let result = rx.await.unwrap_or(Err(AssetError::Aborted));
        Some(self.finish(result))
    }

    fn finish(&mut self, result: Result<SceneNode, AssetError>) -> StageEvent {
        match result {
            Ok(scene) => {
                let mut model = OverlayModel::from_loaded(scene);
                // Carry the current pose over so the swap does not jump
                model.set_transform(*self.active.transform());
                self.active = model;
                self.load = LoadState::Attached;
                tracing::info!("Overlay model loaded");
                StageEvent::Attached
            }
            Err(e) => {
                tracing::error!("Failed to load overlay model, keeping placeholder: {}", e);
                self.load = LoadState::Failed;
                StageEvent::Failed(e)
            }
        }
    }

    fn log_progress(&mut self) {
        if let Some(rx) = &mut self.progress {
            if rx.has_changed().unwrap_or(false) {
                let fraction = *rx.borrow_and_update();
                tracing::debug!("Loading: {:.0}%", fraction * 100.0);
            }
        }
    }

    pub fn active_model(&self) -> &OverlayModel {
        &self.active
    }

    pub fn apply_pose(&mut self, pose: &Pose) {
        self.active.set_transform(pose.transform());
    }

    /// Latest reported load progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        match (&self.load, &self.progress) {
            (LoadState::Attached, _) => 1.0,
            (_, Some(rx)) => *rx.borrow(),
            (_, None) => 0.0,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Pending(_))
    }

    pub fn is_final(&self) -> bool {
        self.active.variant() == ModelVariant::Final
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Primitive;
    use crate::testing::FakeLoader;
    use glam::Mat4;

    fn offset_triangle() -> SceneNode {
        let prim = Primitive {
            positions: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0)],
            normals: vec![Vec3::Z; 3],
            indices: vec![0, 1, 2],
            base_color: [1.0; 4],
        };
        let mut mesh = Mesh::new(vec![prim]);
        mesh.visible = false;
        mesh.transform.translation = Vec3::new(5.0, 0.0, 0.0);
        Group::new(vec![mesh.into()]).into()
    }

    #[test]
    fn test_placeholder_shape() {
        let model = OverlayModel::placeholder();
        assert_eq!(model.variant(), ModelVariant::Placeholder);
        assert_eq!(model.root().mesh_count(), 3);

        let bounds = model.root().bounding_box().unwrap();
        // Lens rims reach 0.2 + 0.09 either side of the bridge
        assert!((bounds.max.x - 0.29).abs() < 1e-4);
        assert!((bounds.min.x + 0.29).abs() < 1e-4);
    }

    #[test]
    fn test_from_loaded_recentres_and_shows() {
        let model = OverlayModel::from_loaded(offset_triangle());
        assert_eq!(model.variant(), ModelVariant::Final);

        let center = model.root().bounding_box().unwrap().center();
        assert!(center.length() < 1e-5);

        let mut drawn = 0;
        model.root().walk(Mat4::IDENTITY, &mut |_, _| drawn += 1);
        assert_eq!(drawn, 1);
    }

    #[tokio::test]
    async fn test_double_load_attaches_once() {
        let loader = Arc::new(FakeLoader::ok(offset_triangle()));
        let mut stage = AssetStage::new();

        assert!(stage.load_final(Arc::clone(&loader), "glasses.gltf"));
        assert!(!stage.load_final(Arc::clone(&loader), "glasses.gltf"));
        assert!(stage.is_loading());

        assert!(matches!(stage.wait_loaded().await, Some(StageEvent::Attached)));
        assert!(stage.is_final());
        assert_eq!(stage.progress(), 1.0);

        assert!(!stage.load_final(Arc::clone(&loader), "glasses.gltf"));
        assert!(stage.poll().is_none());
        assert!(stage.wait_loaded().await.is_none());
        assert_eq!(loader.loads(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_placeholder() {
        let loader = Arc::new(FakeLoader::failing());
        let mut stage = AssetStage::new();
        stage.load_final(loader, "missing.gltf");

        let event = stage.wait_loaded().await;
        assert!(matches!(event, Some(StageEvent::Failed(AssetError::NotFound(_)))));
        assert_eq!(stage.active_model().variant(), ModelVariant::Placeholder);

        // The failure is reported exactly once
        assert!(stage.poll().is_none());
        assert!(stage.wait_loaded().await.is_none());
    }

    #[tokio::test]
    async fn test_poll_swaps_on_completion() {
        let (loader, gate) = FakeLoader::gated(offset_triangle());
        let mut stage = AssetStage::new();
        stage.load_final(Arc::new(loader), "glasses.gltf");

        tokio::task::yield_now().await;
        assert!(stage.poll().is_none());
        assert!(!stage.is_final());

        gate.notify_one();
        let event = loop {
            if let Some(event) = stage.poll() {
                break event;
            }
            tokio::task::yield_now().await;
        };
        assert!(matches!(event, StageEvent::Attached));
        assert!(stage.is_final());
    }

    #[tokio::test]
    async fn test_pose_carries_over_swap() {
        let loader = Arc::new(FakeLoader::ok(offset_triangle()));
        let mut stage = AssetStage::new();
        let pose = Pose {
            position: Vec3::new(0.1, 0.2, 0.3),
            scale: 0.5,
            rotation_z: 0.25,
        };
        stage.apply_pose(&pose);

        stage.load_final(loader, "glasses.gltf");
        stage.wait_loaded().await;
        assert_eq!(*stage.active_model().transform(), pose.transform());
    }
}
