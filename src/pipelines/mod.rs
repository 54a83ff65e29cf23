//! Render pipeline construction.
//!
//! A pipeline here is fully determined by a program's shader modules and
//! layouts, the formats of the target it draws into and an explicit
//! [`RasterState`]. Programs cache the pipelines they build per
//! ([`TargetLayout`], [`RasterState`]) pair.

use crate::state::TargetLayout;

/// Depth test and write settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub compare: wgpu::CompareFunction,
    pub write: bool,
}

impl DepthState {
    pub const LESS_EQUAL: DepthState = DepthState {
        compare: wgpu::CompareFunction::LessEqual,
        write: true,
    };
}

/// Fixed-function state a draw runs with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub cull: Option<wgpu::Face>,
    /// `None` on a target with depth means "always pass, never write".
    pub depth: Option<DepthState>,
    pub blend: Option<wgpu::BlendState>,
}

impl RasterState {
    /// Back-face culled, `LessEqual` depth tested, opaque.
    pub const OPAQUE: RasterState = RasterState {
        cull: Some(wgpu::Face::Back),
        depth: Some(DepthState::LESS_EQUAL),
        blend: None,
    };

    /// No culling, no depth, no blending.
    pub const FULL_SCREEN: RasterState = RasterState {
        cull: None,
        depth: None,
        blend: None,
    };

    /// `ONE, ONE` additive blending with depth rejection disabled.
    pub const ADDITIVE: RasterState = RasterState {
        cull: None,
        depth: None,
        blend: Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        }),
    };
}

impl Default for RasterState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

pub(crate) struct PipelineModules<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub fragment: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
    pub vertex_layouts: &'a [wgpu::VertexBufferLayout<'a>],
}

pub(crate) fn mk_render_pipeline(
    device: &wgpu::Device,
    modules: &PipelineModules,
    target: &TargetLayout,
    raster: &RasterState,
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = target
        .color_formats
        .iter()
        .map(|format| {
            format.map(|format| wgpu::ColorTargetState {
                format,
                blend: raster.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Program Pipeline"),
        layout: Some(modules.layout),
        vertex: wgpu::VertexState {
            module: modules.vertex,
            entry_point: Some("vs_main"),
            buffers: modules.vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: modules.fragment,
            entry_point: Some("fs_main"),
            targets: &targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: raster.cull,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: target.depth_format.map(|format| {
            let depth = raster.depth.unwrap_or(DepthState {
                compare: wgpu::CompareFunction::Always,
                write: false,
            });
            wgpu::DepthStencilState {
                format,
                depth_write_enabled: Some(depth.write),
                depth_compare: Some(depth.compare),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
