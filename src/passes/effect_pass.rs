use std::iter;

use crate::{
    context::RenderingContext,
    data_structures::{
        bound::Viewport,
        frame_buffer::{Attachment, FrameBuffer},
        texture::{RenderTexture, Resizable, Texture},
    },
    error::{Error, Result},
    passes::render_pass::{RenderPass, ScreenQuad},
    pipelines::RasterState,
    shader::ShaderProgram,
    state::{Clear, GpuFrameBuffer, RenderingState},
};

const COPY_FRAGMENT: &str = include_str!("shaders/copy.frag.wgsl");

/// The fragment stage of a full-screen effect and the values it needs.
pub trait Effect {
    /// WGSL source with an `fs_main` reading `VertexOutput` from
    /// `#include <full_screen_varyings>`.
    fn fragment_source(&self) -> &str;

    /// Stages the effect's uniforms. Called before every draw.
    fn bind(&mut self, program: &mut ShaderProgram) -> Result<()>;
}

/// Copies `input` unchanged. Renders black while `input` is `None`.
#[derive(Clone, Debug, Default)]
pub struct CopyEffect {
    pub input: Option<Texture>,
}

impl CopyEffect {
    pub fn new(input: Option<Texture>) -> Self {
        Self { input }
    }
}

impl Effect for CopyEffect {
    fn fragment_source(&self) -> &str {
        COPY_FRAGMENT
    }

    fn bind(&mut self, program: &mut ShaderProgram) -> Result<()> {
        program
            .uniform("source_texture")?
            .set_sampler_2d(self.input.as_ref())
    }
}

/// A full-screen draw of an [`Effect`] into its own output texture or the surface.
pub struct EffectPass<E: Effect> {
    pub effect: E,
    program: ShaderProgram,
    quad: ScreenQuad,
    output: RenderTexture,
    frame_buffer: FrameBuffer,
    viewport: Option<Viewport>,
}

impl<E: Effect> EffectPass<E> {
    pub fn new(ctx: &RenderingContext, effect: E) -> Result<Self> {
        let program = ScreenQuad::program(ctx.state(), effect.fragment_source())?;
        let output = RenderTexture::new(256, 256, wgpu::TextureFormat::Rgba8Unorm);
        let frame_buffer = FrameBuffer::new().with_attachment(Attachment::Color(0), output.clone());
        Ok(Self {
            effect,
            program,
            quad: ScreenQuad::new()?,
            output,
            frame_buffer,
            viewport: None,
        })
    }

    pub fn output(&self) -> &RenderTexture {
        &self.output
    }

    /// Draws into [`EffectPass::output`], resized to the pass viewport first.
    pub fn render(&mut self, ctx: &mut RenderingContext) -> Result<()> {
        let (width, height) = self.viewport(ctx).target_size();
        self.output.set_size(width, height);
        let state = ctx.state_mut();
        let target = state.get_frame_buffer(&self.frame_buffer)?;
        self.draw(state, &target, "effect pass")
    }

    /// Draws into the next surface texture and presents it.
    pub fn present(&mut self, ctx: &mut RenderingContext) -> Result<()> {
        let (frame, target) = ctx
            .acquire_frame()?
            .ok_or_else(|| Error::configuration("cannot present from a headless context"))?;
        self.draw(ctx.state_mut(), &target, "present pass")?;
        frame.present();
        Ok(())
    }

    fn draw(&mut self, state: &mut RenderingState, target: &GpuFrameBuffer, label: &str) -> Result<()> {
        state.begin_frame();
        let mut encoder = state
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = target.begin(&mut encoder, label, Clear::color(wgpu::Color::BLACK));
            self.program
                .use_program(state, &target.layout(), &RasterState::FULL_SCREEN);
            self.quad.bind(&mut self.program)?;
            self.effect.bind(&mut self.program)?;
            self.program.update(state)?;
            self.program.draw(&mut pass, self.quad.count())?;
        }
        state.queue().submit(iter::once(encoder.finish()));
        Ok(())
    }
}

impl<E: Effect> RenderPass for EffectPass<E> {
    fn explicit_viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }
}
