use cgmath::Matrix4;

use crate::{
    context::RenderingContext,
    data_structures::{bound::Viewport, geometry::Geometry},
    error::Result,
    resources::build_plane_geometry,
    scene::OPENGL_TO_WGPU_MATRIX,
    shader::{ShaderProgram, builtin_library},
    state::RenderingState,
};

pub(crate) const FULL_SCREEN_VERTEX: &str = include_str!("shaders/full_screen.vert.wgsl");

/// A pass that renders into targets sized by a viewport.
///
/// Without an explicit viewport the pass follows the context's.
pub trait RenderPass {
    fn explicit_viewport(&self) -> Option<Viewport>;

    fn set_viewport(&mut self, viewport: Option<Viewport>);

    /// Pins the pass to a `width` x `height` viewport at the origin.
    fn set_size(&mut self, width: u32, height: u32) {
        self.set_viewport(Some(Viewport::new(0, 0, width, height)));
    }

    fn viewport(&self, ctx: &RenderingContext) -> Viewport {
        self.explicit_viewport().unwrap_or_else(|| ctx.viewport())
    }
}

/// The orthographic projection that maps the unit quad onto the whole target.
pub fn output_projection() -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::ortho(-0.5, 0.5, -0.5, 0.5, -0.1, 0.1)
}

/// The unit quad every full-screen draw renders.
pub(crate) struct ScreenQuad {
    geometry: Geometry,
    projection: Matrix4<f32>,
}

impl ScreenQuad {
    pub fn new() -> Result<Self> {
        Ok(Self {
            geometry: build_plane_geometry(1.0, 1.0)?,
            projection: output_projection(),
        })
    }

    /// Links `fragment` against the shared full-screen vertex stage.
    pub fn program(state: &RenderingState, fragment: &str) -> Result<ShaderProgram> {
        ShaderProgram::new(state, FULL_SCREEN_VERTEX, fragment, Some(&builtin_library()))
    }

    /// Stages the quad's projection and vertex buffers on `program`.
    pub fn bind(&self, program: &mut ShaderProgram) -> Result<()> {
        program
            .uniform("output_projection")?
            .set_mat4(self.projection)?;
        program
            .attribute("position")?
            .set_vec3(self.geometry.buffer("vertex"))?;
        program.attribute("uv")?.set_vec2(self.geometry.buffer("uv"))?;
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.geometry.count()
    }
}
