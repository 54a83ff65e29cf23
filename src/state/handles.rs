//! Native GPU handles handed out by the [`RenderingState`](super::RenderingState).
//!
//! Handles are cheap clones around wgpu objects. Each carries a [`NativeId`]
//! that stays stable for the lifetime of its cache entry, and textures carry a
//! storage generation that changes whenever the underlying allocation is
//! replaced (for example after a resize).

use crate::data_structures::frame_buffer::Attachment;

/// Identity of a cache entry's native object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub(crate) u64);

/// A GPU texture with its default view and sampler.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    pub native_id: NativeId,
    /// Generation of the allocation backing this texture.
    pub storage: u64,
    /// Bumped on every sync, so views and samplers built from an older
    /// handle can be told apart.
    pub sync: u64,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
}

impl GpuTexture {
    pub fn is_depth(&self) -> bool {
        self.format.is_depth_stencil_format()
    }

    pub(crate) fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// A vertex buffer uploaded from a geometry buffer.
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    pub native_id: NativeId,
    pub buffer: wgpu::Buffer,
    pub size: u64,
}

/// Formats of everything a render pass writes to. Pipelines are keyed by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetLayout {
    pub color_formats: Vec<Option<wgpu::TextureFormat>>,
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// What a render pass does with existing target contents.
#[derive(Copy, Clone, Debug, Default)]
pub struct Clear {
    /// `None` keeps the color attachments' contents.
    pub color: Option<wgpu::Color>,
    /// `None` keeps the depth attachment's contents.
    pub depth: Option<f32>,
}

impl Clear {
    pub const LOAD: Clear = Clear {
        color: None,
        depth: None,
    };

    pub fn color(color: wgpu::Color) -> Self {
        Self {
            color: Some(color),
            depth: None,
        }
    }

    pub fn all(color: wgpu::Color, depth: f32) -> Self {
        Self {
            color: Some(color),
            depth: Some(depth),
        }
    }

    pub fn depth(depth: f32) -> Self {
        Self {
            color: None,
            depth: Some(depth),
        }
    }
}

/// The attachment views of a frame buffer, ready to begin a render pass.
///
/// Color slots that are not in the draw-buffer set are `None` so that
/// fragment outputs at those locations are discarded.
#[derive(Clone, Debug)]
pub struct GpuFrameBuffer {
    pub native_id: NativeId,
    pub width: u32,
    pub height: u32,
    pub(crate) colors: Vec<Option<wgpu::TextureView>>,
    pub(crate) color_formats: Vec<Option<wgpu::TextureFormat>>,
    pub(crate) depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    pub(crate) storage: Vec<(Attachment, u64)>,
}

impl GpuFrameBuffer {
    /// Wraps a single externally owned view, such as a surface texture.
    pub fn from_view(view: wgpu::TextureView, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            native_id: NativeId(0),
            width,
            height,
            colors: vec![Some(view)],
            color_formats: vec![Some(format)],
            depth: None,
            storage: Vec::new(),
        }
    }

    pub fn layout(&self) -> TargetLayout {
        TargetLayout {
            color_formats: self.color_formats.clone(),
            depth_format: self.depth.as_ref().map(|(_, format)| *format),
        }
    }

    /// Begins a render pass on this target. The pass ends when dropped.
    pub fn begin<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        clear: Clear,
    ) -> wgpu::RenderPass<'e> {
        let color_load = match clear.color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = self
            .colors
            .iter()
            .map(|view| {
                view.as_ref().map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let depth_stencil_attachment =
            self.depth
                .as_ref()
                .map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: match clear.depth {
                            Some(depth) => wgpu::LoadOp::Clear(depth),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
            ..Default::default()
        })
    }
}
