use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::scene::{
    camera::Camera,
    lights::{AmbientLight, DirectionalLight, PointLight},
    mesh::MeshInstance,
    object::{ObjectKind, SceneObject},
    scene::Scene,
};

/// A directional light with its direction in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalEntry {
    pub light: DirectionalLight,
    pub direction: Vector3<f32>,
}

/// A point light with its world position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointEntry {
    pub light: PointLight,
    pub position: Vector3<f32>,
}

/// Visible scene content sorted by kind, in traversal order.
///
/// Rebuilt from scratch by every [`RenderBuckets::update`].
#[derive(Default)]
pub struct RenderBuckets {
    pub meshes: Vec<MeshInstance>,
    pub ambient_lights: Vec<AmbientLight>,
    pub directional_lights: Vec<DirectionalEntry>,
    pub point_lights: Vec<PointEntry>,
}

impl RenderBuckets {
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.ambient_lights.clear();
        self.directional_lights.clear();
        self.point_lights.clear();
    }

    /// Runs the per-frame scene update.
    ///
    /// World transforms of all visible nodes are recomputed in one depth-first
    /// traversal, then the camera, then the view-dependent mesh matrices.
    pub fn update(&mut self, scene: &Scene, camera: &mut Camera) {
        self.clear();
        let mut mesh_objects = Vec::new();
        scene
            .root()
            .update_world(Matrix4::identity(), &mut |object: &SceneObject| {
                let model = object.model_matrix();
                match &*object.kind() {
                    ObjectKind::Other => {}
                    ObjectKind::Mesh(_) => mesh_objects.push(object.clone()),
                    ObjectKind::AmbientLight(light) => self.ambient_lights.push(*light),
                    ObjectKind::DirectionalLight(light) => {
                        let world = model * light.direction.extend(0.0);
                        let direction = world.truncate();
                        self.directional_lights.push(DirectionalEntry {
                            light: *light,
                            direction: if direction.magnitude2() > 0.0 {
                                direction.normalize()
                            } else {
                                light.direction
                            },
                        });
                    }
                    ObjectKind::PointLight(light) => {
                        let position: Vector4<f32> = model.w;
                        self.point_lights.push(PointEntry {
                            light: *light,
                            position: position.truncate(),
                        });
                    }
                }
            });

        camera.update();
        let view = camera.view_matrix();
        for object in mesh_objects {
            object.update_view(&view);
            if let ObjectKind::Mesh(mesh) = &*object.kind() {
                self.meshes.push(MeshInstance {
                    geometry: mesh.geometry.clone(),
                    material: mesh.material.clone(),
                    model_matrix: object.model_matrix(),
                    model_view_matrix: object.model_view_matrix(),
                    normal_matrix: object.normal_matrix(),
                });
            }
        }
        log::trace!(
            "scene update: {} meshes, {} ambient, {} directional, {} point lights",
            self.meshes.len(),
            self.ambient_lights.len(),
            self.directional_lights.len(),
            self.point_lights.len()
        );
    }
}
