//! The retained scene graph.
//!
//! A [`Scene`] owns a tree of [`SceneObject`]s. Each frame the renderer walks
//! the visible part of the tree once, recomputing world transforms and sorting
//! meshes and lights into [`RenderBuckets`].

pub mod buckets;
pub mod camera;
pub mod lights;
pub mod material;
pub mod mesh;
pub mod object;
#[allow(clippy::module_inception)]
pub mod scene;

pub use buckets::{DirectionalEntry, PointEntry, RenderBuckets};
pub use camera::{Camera, OPENGL_TO_WGPU_MATRIX, Projection, look_at};
pub use lights::{AmbientLight, DirectionalLight, PointLight};
pub use material::SimpleMaterial;
pub use mesh::{Material, Mesh, MeshInstance, SharedMaterial};
pub use object::{ObjectKind, SceneObject, SceneObjectData};
pub use scene::Scene;
