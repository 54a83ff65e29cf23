use std::{cell::RefCell, rc::Rc};

use cgmath::Matrix4;

use crate::{
    data_structures::geometry::Geometry,
    error::Result,
    scene::camera::Camera,
    shader::program::ShaderProgram,
};

/// Surface description of a mesh.
///
/// `bind` must stage every uniform and attribute its program needs. The
/// renderer calls it between `use_program` and `update` for each draw.
pub trait Material {
    fn program_mut(&mut self) -> &mut ShaderProgram;

    fn bind(&mut self, mesh: &MeshInstance, camera: &Camera) -> Result<()>;
}

pub type SharedMaterial = Rc<RefCell<dyn Material>>;

/// Geometry drawn with a material.
#[derive(Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: SharedMaterial,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: SharedMaterial) -> Self {
        Self { geometry, material }
    }
}

/// A mesh as seen in one frame: its geometry, material and the matrices
/// derived during the scene update.
#[derive(Clone)]
pub struct MeshInstance {
    pub geometry: Geometry,
    pub material: SharedMaterial,
    pub model_matrix: Matrix4<f32>,
    pub model_view_matrix: Matrix4<f32>,
    pub normal_matrix: Matrix4<f32>,
}
