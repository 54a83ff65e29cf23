use std::{cell::RefCell, rc::Rc};

use crate::{
    data_structures::{color::Color, texture::Texture},
    error::Result,
    scene::{
        camera::Camera,
        mesh::{Material, MeshInstance, SharedMaterial},
    },
    shader::{builtin::builtin_library, program::ShaderProgram},
    state::RenderingState,
};

const VERTEX_SHADER: &str = include_str!("shaders/simple_material.vert.wgsl");
const FRAGMENT_SHADER: &str = include_str!("shaders/simple_material.frag.wgsl");

/// Flat color, optionally modulated by a texture.
///
/// Writes albedo to the first G-buffer target and the packed world-space
/// normal to the second. Reads the `vertex`, `normal` and `uv` buffers of the
/// mesh geometry.
pub struct SimpleMaterial {
    pub color: Color,
    pub map: Option<Texture>,
    program: ShaderProgram,
}

impl SimpleMaterial {
    pub fn new(state: &RenderingState) -> Result<Self> {
        let program = ShaderProgram::new(
            state,
            VERTEX_SHADER,
            FRAGMENT_SHADER,
            Some(&builtin_library()),
        )?;
        Ok(Self {
            color: Color::WHITE,
            map: None,
            program,
        })
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn shared(self) -> SharedMaterial {
        Rc::new(RefCell::new(self))
    }
}

impl Material for SimpleMaterial {
    fn program_mut(&mut self) -> &mut ShaderProgram {
        &mut self.program
    }

    fn bind(&mut self, mesh: &MeshInstance, camera: &Camera) -> Result<()> {
        let program = &mut self.program;
        program
            .uniform("projection_matrix")?
            .set_mat4(camera.projection_matrix())?;
        program
            .uniform("model_view_matrix")?
            .set_mat4(mesh.model_view_matrix)?;
        program.uniform("normal_matrix")?.set_mat4(mesh.normal_matrix)?;

        program.uniform("color")?.set_vec3(self.color)?;
        program.uniform("enable_map")?.set_bool(self.map.is_some())?;
        program
            .uniform("color_map")?
            .set_sampler_2d(self.map.as_ref())?;

        program
            .attribute("position")?
            .set_vec3(mesh.geometry.buffer("vertex"))?;
        program
            .attribute("normal")?
            .set_vec3(mesh.geometry.buffer("normal"))?;
        program.attribute("uv")?.set_vec2(mesh.geometry.buffer("uv"))?;
        Ok(())
    }
}
