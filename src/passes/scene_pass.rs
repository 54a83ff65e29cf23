//! The deferred scene renderer.
//!
//! One [`ScenePass::render`] call runs these stages in order, all recorded
//! into a single command encoder:
//!
//! 1. resize the working textures to the pass viewport
//! 2. update world transforms and sort the scene into buckets
//! 3. geometry pass into albedo, packed normal and depth
//! 4. light accumulation with additive blending, where every shadow casting
//!    directional light first renders its own shadow map
//! 5. composite of the accumulation buffer (or the 2x2 debug grid) into the output

use std::iter;

use cgmath::{EuclideanSpace, Matrix4, Point3, Vector3};

use crate::{
    context::RenderingContext,
    data_structures::{
        bound::{Bound2, Viewport},
        color::Color,
        frame_buffer::{Attachment, FrameBuffer},
        texture::{RenderTexture, Resizable},
    },
    error::Result,
    passes::render_pass::{RenderPass, ScreenQuad},
    pipelines::{DepthState, RasterState},
    scene::{Camera, DirectionalEntry, OPENGL_TO_WGPU_MATRIX, RenderBuckets, Scene, look_at},
    shader::{ShaderProgram, builtin_library},
    state::{Clear, RenderingState, TargetLayout},
};

const COPY_FRAGMENT: &str = include_str!("shaders/copy.frag.wgsl");
const DEPTH_PREVIEW_FRAGMENT: &str = include_str!("shaders/depth_preview.frag.wgsl");
const AMBIENT_FRAGMENT: &str = include_str!("shaders/ambient.frag.wgsl");
const DIRECTIONAL_FRAGMENT: &str = include_str!("shaders/directional.frag.wgsl");
const POINT_FRAGMENT: &str = include_str!("shaders/point.frag.wgsl");
const SHADOW_VERTEX: &str = include_str!("shaders/shadow.vert.wgsl");
const SHADOW_FRAGMENT: &str = include_str!("shaders/shadow.frag.wgsl");
const REGION_CLEAR_FRAGMENT: &str = include_str!("shaders/region_clear.frag.wgsl");

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const SHADOW_RASTER: RasterState = RasterState {
    cull: None,
    depth: Some(DepthState::LESS_EQUAL),
    blend: None,
};

/// Overwrites every G-buffer attachment, depth included.
const REGION_CLEAR_RASTER: RasterState = RasterState {
    cull: None,
    depth: Some(DepthState {
        compare: wgpu::CompareFunction::Always,
        write: true,
    }),
    blend: None,
};

/// Shadow-map settings shared by every directional light.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScenePassConfig {
    /// Width and height of the square shadow map in texels.
    pub shadow_resolution: u32,
    /// Depth offset that keeps lit surfaces from shadowing themselves.
    pub shadow_bias: f32,
    /// Half-width of the light-space orthographic box.
    pub shadow_extent: f32,
    /// Distance of the light's eye from the origin.
    pub shadow_distance: f32,
}

impl Default for ScenePassConfig {
    fn default() -> Self {
        Self {
            shadow_resolution: 1024,
            shadow_bias: 0.005,
            shadow_extent: 10.0,
            shadow_distance: 20.0,
        }
    }
}

/// A step of [`ScenePass::render`], in the order they run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PassStage {
    Resize,
    SceneUpdate,
    Geometry,
    /// The accumulation buffer was cleared.
    Accumulation,
    Ambient,
    Shadow,
    Directional,
    Point,
    Composite,
}

struct Programs {
    copy: ShaderProgram,
    depth_preview: ShaderProgram,
    ambient: ShaderProgram,
    directional: ShaderProgram,
    point: ShaderProgram,
    shadow: ShaderProgram,
    region_clear: ShaderProgram,
}

impl Programs {
    fn new(state: &RenderingState) -> Result<Self> {
        Ok(Self {
            copy: ScreenQuad::program(state, COPY_FRAGMENT)?,
            depth_preview: ScreenQuad::program(state, DEPTH_PREVIEW_FRAGMENT)?,
            ambient: ScreenQuad::program(state, AMBIENT_FRAGMENT)?,
            directional: ScreenQuad::program(state, DIRECTIONAL_FRAGMENT)?,
            point: ScreenQuad::program(state, POINT_FRAGMENT)?,
            shadow: ShaderProgram::new(state, SHADOW_VERTEX, SHADOW_FRAGMENT, Some(&builtin_library()))?,
            region_clear: ScreenQuad::program(state, REGION_CLEAR_FRAGMENT)?,
        })
    }
}

/// The G-buffer and light targets a scene renders through.
struct Targets {
    color: RenderTexture,
    normal: RenderTexture,
    depth: RenderTexture,
    accumulation: RenderTexture,
    output: RenderTexture,
    shadow_map: RenderTexture,
    geometry: FrameBuffer,
    light: FrameBuffer,
    composite: FrameBuffer,
    shadow: FrameBuffer,
}

impl Targets {
    fn new(depth_format: wgpu::TextureFormat, shadow_resolution: u32) -> Self {
        let color = RenderTexture::new(256, 256, COLOR_FORMAT);
        let normal = RenderTexture::new(256, 256, COLOR_FORMAT);
        let depth = RenderTexture::new(256, 256, depth_format);
        let accumulation = RenderTexture::new(256, 256, COLOR_FORMAT);
        let output = RenderTexture::new(256, 256, COLOR_FORMAT);
        let shadow_map = RenderTexture::new(shadow_resolution, shadow_resolution, depth_format);
        let geometry = FrameBuffer::new()
            .with_attachment(Attachment::Color(0), color.clone())
            .with_attachment(Attachment::Color(1), normal.clone())
            .with_attachment(Attachment::Depth, depth.clone());
        let light = FrameBuffer::new().with_attachment(Attachment::Color(0), accumulation.clone());
        let composite = FrameBuffer::new().with_attachment(Attachment::Color(0), output.clone());
        let shadow = FrameBuffer::new().with_attachment(Attachment::Depth, shadow_map.clone());
        Self {
            color,
            normal,
            depth,
            accumulation,
            output,
            shadow_map,
            geometry,
            light,
            composite,
            shadow,
        }
    }

    fn resize(&self, width: u32, height: u32) {
        for texture in [
            &self.color,
            &self.normal,
            &self.depth,
            &self.accumulation,
            &self.output,
        ] {
            texture.set_size(width, height);
        }
    }

    /// Stages whichever G-buffer samplers `program` actually reads.
    fn bind_gbuffer(&self, program: &mut ShaderProgram) -> Result<()> {
        for (name, texture) in [
            ("color_texture", &self.color),
            ("normal_texture", &self.normal),
            ("depth_texture", &self.depth),
        ] {
            if let Some(uniform) = program.try_uniform(name) {
                uniform.set_sampler_2d(Some(texture.texture()))?;
            }
        }
        Ok(())
    }
}

/// Deferred renderer for a [`Scene`] seen through a [`Camera`].
pub struct ScenePass {
    pub config: ScenePassConfig,
    /// Composites color, normal, depth and accumulation in a 2x2 grid.
    pub debug: bool,
    viewport: Option<Viewport>,
    buckets: RenderBuckets,
    quad: ScreenQuad,
    programs: Programs,
    targets: Targets,
    stages: Vec<PassStage>,
}

impl ScenePass {
    pub fn new(ctx: &RenderingContext) -> Result<Self> {
        Self::with_config(ctx, ScenePassConfig::default())
    }

    pub fn with_config(ctx: &RenderingContext, config: ScenePassConfig) -> Result<Self> {
        Ok(Self {
            config,
            debug: false,
            viewport: None,
            buckets: RenderBuckets::default(),
            quad: ScreenQuad::new()?,
            programs: Programs::new(ctx.state())?,
            targets: Targets::new(ctx.capabilities().depth_format, config.shadow_resolution),
            stages: Vec::new(),
        })
    }

    /// The composited result of the last render.
    pub fn output(&self) -> &RenderTexture {
        &self.targets.output
    }

    pub fn color_texture(&self) -> &RenderTexture {
        &self.targets.color
    }

    pub fn normal_texture(&self) -> &RenderTexture {
        &self.targets.normal
    }

    pub fn depth_texture(&self) -> &RenderTexture {
        &self.targets.depth
    }

    pub fn accumulation_texture(&self) -> &RenderTexture {
        &self.targets.accumulation
    }

    pub fn shadow_map(&self) -> &RenderTexture {
        &self.targets.shadow_map
    }

    pub fn buckets(&self) -> &RenderBuckets {
        &self.buckets
    }

    /// Stages run by the last [`ScenePass::render`] call, in order.
    pub fn last_stages(&self) -> &[PassStage] {
        &self.stages
    }

    fn enter(&mut self, stage: PassStage) {
        log::trace!("scene pass: {:?}", stage);
        self.stages.push(stage);
    }

    /// Renders `scene` into [`ScenePass::output`].
    ///
    /// `target` restricts the geometry pass to a normalized sub-rectangle of
    /// the viewport. A failure aborts the frame and leaves the output stale.
    pub fn render(
        &mut self,
        ctx: &mut RenderingContext,
        scene: &Scene,
        camera: &mut Camera,
        target: Option<Bound2>,
    ) -> Result<()> {
        self.stages.clear();
        let (width, height) = self.viewport(ctx).target_size();
        let state = ctx.state_mut();
        state.begin_frame();

        self.targets.resize(width, height);
        self.targets
            .shadow_map
            .set_size(self.config.shadow_resolution, self.config.shadow_resolution);
        self.enter(PassStage::Resize);

        self.buckets.update(scene, camera);
        self.enter(PassStage::SceneUpdate);

        let mut encoder = state
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene pass"),
            });
        let scissor = target.map(|bound| bound.to_scissor(width, height));
        self.render_meshes(state, &mut encoder, scene.clear_color, camera, scissor)?;
        self.render_lights(state, &mut encoder, camera)?;
        self.composite(state, &mut encoder, width, height)?;
        state.queue().submit(iter::once(encoder.finish()));
        Ok(())
    }

    fn render_meshes(
        &mut self,
        state: &mut RenderingState,
        encoder: &mut wgpu::CommandEncoder,
        clear_color: Color,
        camera: &Camera,
        scissor: Option<(u32, u32, u32, u32)>,
    ) -> Result<()> {
        let target = state.get_frame_buffer(&self.targets.geometry)?;
        let layout = target.layout();
        {
            // a target rect keeps everything outside it, so only the rect is cleared
            let clear = match scissor {
                Some(_) => Clear::LOAD,
                None => Clear::all(clear_color.to_wgpu(), 1.0),
            };
            let mut pass = target.begin(encoder, "geometry pass", clear);
            if let Some((x, y, width, height)) = scissor {
                pass.set_scissor_rect(x, y, width, height);
                let program = &mut self.programs.region_clear;
                program
                    .uniform("clear_color")?
                    .set_vec4([clear_color.r, clear_color.g, clear_color.b, 1.0])?;
                program.use_program(state, &layout, &REGION_CLEAR_RASTER);
                self.quad.bind(program)?;
                program.update(state)?;
                program.draw(&mut pass, self.quad.count())?;
            }
            for mesh in &self.buckets.meshes {
                let mut material = mesh.material.borrow_mut();
                material.bind(mesh, camera)?;
                let program = material.program_mut();
                program.use_program(state, &layout, &RasterState::OPAQUE);
                program.update(state)?;
                program.draw(&mut pass, mesh.geometry.count())?;
            }
        }
        self.enter(PassStage::Geometry);
        Ok(())
    }

    fn render_lights(
        &mut self,
        state: &mut RenderingState,
        encoder: &mut wgpu::CommandEncoder,
        camera: &Camera,
    ) -> Result<()> {
        let target = state.get_frame_buffer(&self.targets.light)?;
        let layout = target.layout();
        drop(target.begin(encoder, "accumulation clear", Clear::color(wgpu::Color::BLACK)));
        self.enter(PassStage::Accumulation);
        let projection_view_inverse = camera.projection_view_inverse();

        if !self.buckets.ambient_lights.is_empty() {
            let program = &mut self.programs.ambient;
            let mut pass = target.begin(encoder, "ambient lights", Clear::LOAD);
            program.use_program(state, &layout, &RasterState::ADDITIVE);
            for light in &self.buckets.ambient_lights {
                self.quad.bind(program)?;
                self.targets.bind_gbuffer(program)?;
                program.uniform("light_color")?.set_vec3(light.color)?;
                program
                    .uniform("light_intensity")?
                    .set_float(light.intensity)?;
                program.update(state)?;
                program.draw(&mut pass, self.quad.count())?;
            }
            drop(pass);
            self.enter(PassStage::Ambient);
        }

        for index in 0..self.buckets.directional_lights.len() {
            let entry = self.buckets.directional_lights[index];
            let light_projection_view = self.light_projection_view(&entry);
            let shadows = entry.light.enable_shadows;
            if shadows {
                self.render_shadow_map(state, encoder, light_projection_view)?;
            }

            let program = &mut self.programs.directional;
            let mut pass = target.begin(encoder, "directional light", Clear::LOAD);
            program.use_program(state, &layout, &RasterState::ADDITIVE);
            self.quad.bind(program)?;
            self.targets.bind_gbuffer(program)?;
            program
                .uniform("projection_view_inverse")?
                .set_mat4(projection_view_inverse)?;
            program
                .uniform("light_projection_view")?
                .set_mat4(light_projection_view)?;
            program.uniform("light_color")?.set_vec3(entry.light.color)?;
            program
                .uniform("light_intensity")?
                .set_float(entry.light.intensity)?;
            program
                .uniform("light_direction")?
                .set_vec3(entry.direction)?;
            program
                .uniform("shadow_bias")?
                .set_float(self.config.shadow_bias)?;
            program.uniform("enable_shadows")?.set_bool(shadows)?;
            program
                .uniform("shadow_map")?
                .set_sampler_2d(shadows.then(|| self.targets.shadow_map.texture()))?;
            program.update(state)?;
            program.draw(&mut pass, self.quad.count())?;
            drop(pass);
            self.enter(PassStage::Directional);
        }

        if !self.buckets.point_lights.is_empty() {
            let program = &mut self.programs.point;
            let mut pass = target.begin(encoder, "point lights", Clear::LOAD);
            program.use_program(state, &layout, &RasterState::ADDITIVE);
            for entry in &self.buckets.point_lights {
                self.quad.bind(program)?;
                self.targets.bind_gbuffer(program)?;
                program
                    .uniform("projection_view_inverse")?
                    .set_mat4(projection_view_inverse)?;
                program
                    .uniform("light_position")?
                    .set_vec3(entry.position)?;
                program.uniform("light_color")?.set_vec3(entry.light.color)?;
                program
                    .uniform("light_intensity")?
                    .set_float(entry.light.intensity)?;
                program
                    .uniform("light_decay")?
                    .set_float(entry.light.decay)?;
                program.update(state)?;
                program.draw(&mut pass, self.quad.count())?;
            }
            drop(pass);
            self.enter(PassStage::Point);
        }
        Ok(())
    }

    /// Orthographic light-space transform of a directional light, looking at
    /// the origin from `shadow_distance` along the light direction.
    fn light_projection_view(&self, entry: &DirectionalEntry) -> Matrix4<f32> {
        let extent = self.config.shadow_extent;
        let distance = self.config.shadow_distance;
        let projection = OPENGL_TO_WGPU_MATRIX
            * cgmath::ortho(-extent, extent, -extent, extent, 0.0, distance * 2.0);
        let up = if entry.direction.y.abs() > 0.99 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        let eye = Point3::from_vec(entry.direction * distance);
        projection * look_at(eye, Point3::origin(), up)
    }

    fn render_shadow_map(
        &mut self,
        state: &mut RenderingState,
        encoder: &mut wgpu::CommandEncoder,
        light_projection_view: Matrix4<f32>,
    ) -> Result<()> {
        let target = state.get_frame_buffer(&self.targets.shadow)?;
        let program = &mut self.programs.shadow;
        {
            let mut pass = target.begin(encoder, "shadow pass", Clear::depth(1.0));
            program.use_program(state, &target.layout(), &SHADOW_RASTER);
            for mesh in &self.buckets.meshes {
                program
                    .uniform("light_projection_view")?
                    .set_mat4(light_projection_view)?;
                program.uniform("model_matrix")?.set_mat4(mesh.model_matrix)?;
                program
                    .attribute("position")?
                    .set_vec3(mesh.geometry.buffer("vertex"))?;
                program.update(state)?;
                program.draw(&mut pass, mesh.geometry.count())?;
            }
        }
        self.enter(PassStage::Shadow);
        Ok(())
    }

    fn composite(
        &mut self,
        state: &mut RenderingState,
        encoder: &mut wgpu::CommandEncoder,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let target = state.get_frame_buffer(&self.targets.composite)?;
        let layout = target.layout();
        {
            let mut pass = target.begin(encoder, "composite", Clear::color(wgpu::Color::BLACK));
            if self.debug {
                let (w, h) = (width as f32 / 2.0, height as f32 / 2.0);
                let quadrants = [
                    (0.0, 0.0, Some(&self.targets.color)),
                    (w, 0.0, Some(&self.targets.normal)),
                    (0.0, h, None),
                    (w, h, Some(&self.targets.accumulation)),
                ];
                for (x, y, texture) in quadrants {
                    pass.set_viewport(x, y, w, h, 0.0, 1.0);
                    let program = match texture {
                        Some(texture) => {
                            let program = &mut self.programs.copy;
                            program
                                .uniform("source_texture")?
                                .set_sampler_2d(Some(texture.texture()))?;
                            program
                        }
                        None => {
                            let program = &mut self.programs.depth_preview;
                            self.targets.bind_gbuffer(program)?;
                            program
                        }
                    };
                    draw_full_screen(state, &mut pass, &layout, &self.quad, program)?;
                }
            } else {
                let program = &mut self.programs.copy;
                program
                    .uniform("source_texture")?
                    .set_sampler_2d(Some(self.targets.accumulation.texture()))?;
                draw_full_screen(state, &mut pass, &layout, &self.quad, program)?;
            }
        }
        self.enter(PassStage::Composite);
        Ok(())
    }
}

fn draw_full_screen(
    state: &mut RenderingState,
    pass: &mut wgpu::RenderPass,
    layout: &TargetLayout,
    quad: &ScreenQuad,
    program: &mut ShaderProgram,
) -> Result<()> {
    program.use_program(state, layout, &RasterState::FULL_SCREEN);
    quad.bind(program)?;
    program.update(state)?;
    program.draw(pass, quad.count())
}

impl RenderPass for ScenePass {
    fn explicit_viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }
}

