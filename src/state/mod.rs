//! The GPU resource cache.
//!
//! [`RenderingState`] maps descriptor identity to native handles. A handle is
//! created the first time its descriptor is seen and re-synchronized only when
//! the descriptor's `needs_update` flag is set, after which the flag is
//! cleared. Entries live until [`RenderingState::dispose`] or one of the
//! `release_*` hooks removes them.

use std::collections::HashMap;

use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        ResourceId,
        frame_buffer::{Attachment, FrameBuffer},
        geometry::GeometryBuffer,
        texture::{Texture, TextureParams, TextureSource},
    },
    error::{Error, Result},
};

pub mod handles;

pub use handles::{Clear, GpuBuffer, GpuFrameBuffer, GpuTexture, NativeId, TargetLayout};

/// Creation and sync counters, one pair per cache.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub textures_created: u64,
    pub texture_syncs: u64,
    pub buffers_created: u64,
    pub buffer_syncs: u64,
    pub frame_buffers_created: u64,
    pub frame_buffer_syncs: u64,
    pub bind_groups_created: u64,
}

#[derive(Default)]
struct Fallbacks {
    color: Option<GpuTexture>,
    depth: Option<GpuTexture>,
    comparison: Option<wgpu::Sampler>,
}

/// Per-context cache of native GPU objects keyed by descriptor identity.
pub struct RenderingState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<ResourceId, GpuTexture>,
    buffers: HashMap<ResourceId, GpuBuffer>,
    frame_buffers: HashMap<ResourceId, GpuFrameBuffer>,
    fallbacks: Fallbacks,
    next_native: u64,
    frame: u64,
    stats: CacheStats,
}

impl RenderingState {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            frame_buffers: HashMap::new(),
            fallbacks: Fallbacks::default(),
            next_native: 1,
            frame: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Starts a new frame. Per-frame uniform storage is recycled from here on,
    /// so commands recorded in the previous frame must already be submitted.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn record_bind_group(&mut self) {
        self.stats.bind_groups_created += 1;
    }

    fn next_native_id(&mut self) -> u64 {
        let id = self.next_native;
        self.next_native += 1;
        id
    }

    /// Returns the native texture for `texture`, creating and uploading it as needed.
    pub fn get_texture(&mut self, texture: &Texture) -> Result<GpuTexture> {
        let previous = self.textures.get(&texture.id()).cloned();
        if let Some(handle) = &previous {
            if !texture.needs_update() {
                return Ok(handle.clone());
            }
        }
        let handle = self.sync_texture(texture, previous)?;
        self.textures.insert(texture.id(), handle.clone());
        texture.set_needs_update(false);
        Ok(handle)
    }

    fn sync_texture(&mut self, texture: &Texture, previous: Option<GpuTexture>) -> Result<GpuTexture> {
        let params = texture.params().clone();
        let source = texture.source().clone();
        let (width, height) = texture.size();
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::resource(
                format!("texture {:?}", texture.id()),
                format!("size {}x{} is outside 1..={}", width, height, max),
            ));
        }

        let image = match &source {
            TextureSource::Image(image) => {
                if !matches!(
                    params.format,
                    wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
                ) {
                    return Err(Error::resource(
                        format!("texture {:?}", texture.id()),
                        format!("images upload as 8-bit RGBA, not {:?}", params.format),
                    ));
                }
                Some(if params.flip_y {
                    image::imageops::flip_vertical(image.as_ref())
                } else {
                    image.as_ref().clone()
                })
            }
            TextureSource::Empty { .. } => None,
        };
        let mip_level_count = match (&image, params.generate_mipmaps) {
            (Some(_), true) => 32 - width.max(height).leading_zeros(),
            _ => 1,
        };

        let reusable = previous.as_ref().filter(|p| {
            p.width == width
                && p.height == height
                && p.format == params.format
                && p.mip_level_count == mip_level_count
        });
        let (native_id, storage, gpu_texture, view) = match reusable {
            Some(p) => (p.native_id, p.storage, p.texture.clone(), p.view.clone()),
            None => {
                let usage = match source {
                    TextureSource::Image(_) => {
                        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
                    }
                    TextureSource::Empty { .. } => {
                        wgpu::TextureUsages::RENDER_ATTACHMENT
                            | wgpu::TextureUsages::TEXTURE_BINDING
                            | wgpu::TextureUsages::COPY_SRC
                    }
                };
                let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("cached texture"),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: params.format,
                    usage,
                    view_formats: &[],
                });
                let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
                let native_id = match &previous {
                    Some(p) => p.native_id,
                    None => {
                        self.stats.textures_created += 1;
                        NativeId(self.next_native_id())
                    }
                };
                (native_id, self.next_native_id(), gpu_texture, view)
            }
        };

        if let Some(image) = image {
            upload_mip_chain(&self.queue, &gpu_texture, image, mip_level_count);
        }
        let sampler = create_sampler(&self.device, &params);
        self.stats.texture_syncs += 1;
        log::debug!(
            "synced texture {:?} ({}x{} {:?}, {} mips)",
            texture.id(),
            width,
            height,
            params.format,
            mip_level_count
        );

        Ok(GpuTexture {
            native_id,
            storage,
            sync: self.next_native_id(),
            texture: gpu_texture,
            view,
            sampler,
            format: params.format,
            width,
            height,
            mip_level_count,
        })
    }

    /// Returns the vertex buffer for `buffer`, uploading its data as needed.
    pub fn get_geometry_buffer(&mut self, buffer: &GeometryBuffer) -> Result<GpuBuffer> {
        let previous = self.buffers.get(&buffer.id()).cloned();
        if let Some(handle) = &previous {
            if !buffer.needs_update() {
                return Ok(handle.clone());
            }
        }
        let size = buffer.byte_len();
        let max = self.device.limits().max_buffer_size;
        if size > max {
            return Err(Error::resource(
                format!("geometry buffer {:?}", buffer.id()),
                format!("size {} bytes exceeds {}", size, max),
            ));
        }

        let handle = match previous {
            Some(handle) if handle.size == size => {
                if size > 0 {
                    self.queue
                        .write_buffer(&handle.buffer, 0, bytemuck::cast_slice(&buffer.data()));
                }
                handle
            }
            previous => {
                let native_id = match previous {
                    Some(p) => p.native_id,
                    None => {
                        self.stats.buffers_created += 1;
                        NativeId(self.next_native_id())
                    }
                };
                let usage = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;
                // an empty buffer still gets a minimal native allocation
                let gpu_buffer = if size == 0 {
                    self.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("geometry buffer"),
                        size: wgpu::COPY_BUFFER_ALIGNMENT,
                        usage,
                        mapped_at_creation: false,
                    })
                } else {
                    self.device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("geometry buffer"),
                            contents: bytemuck::cast_slice(&buffer.data()),
                            usage,
                        })
                };
                GpuBuffer {
                    native_id,
                    buffer: gpu_buffer,
                    size,
                }
            }
        };
        self.stats.buffer_syncs += 1;
        log::debug!("synced geometry buffer {:?} ({} bytes)", buffer.id(), size);
        self.buffers.insert(buffer.id(), handle.clone());
        buffer.set_needs_update(false);
        Ok(handle)
    }

    /// Returns the attachment views of `frame_buffer`.
    ///
    /// Every attachment's storage is ensured first. The views are rebuilt when
    /// the frame buffer is dirty or any attachment was reallocated.
    pub fn get_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> Result<GpuFrameBuffer> {
        let mut attached = Vec::new();
        for (attachment, texture) in frame_buffer.attachments() {
            attached.push((attachment, self.get_texture(texture.texture())?));
        }
        let Some((_, first)) = attached.first() else {
            return Err(Error::configuration(format!(
                "frame buffer {:?} has no attachments",
                frame_buffer.id()
            )));
        };
        let (width, height) = (first.width, first.height);
        if let Some((attachment, texture)) = attached
            .iter()
            .find(|(_, t)| (t.width, t.height) != (width, height))
        {
            return Err(Error::configuration(format!(
                "frame buffer {:?}: {:?} is {}x{} but other attachments are {}x{}",
                frame_buffer.id(),
                attachment,
                texture.width,
                texture.height,
                width,
                height
            )));
        }

        let storage: Vec<(Attachment, u64)> = attached.iter().map(|(a, t)| (*a, t.storage)).collect();
        let previous = self.frame_buffers.get(&frame_buffer.id()).cloned();
        if let Some(handle) = &previous {
            if !frame_buffer.needs_update() && handle.storage == storage {
                return Ok(handle.clone());
            }
        }

        let active = frame_buffer.active_color_attachments();
        let slots = active.iter().max().map_or(0, |max| *max as usize + 1);
        let mut colors = vec![None; slots];
        let mut color_formats = vec![None; slots];
        let mut depth = None;
        for (attachment, texture) in &attached {
            match attachment {
                Attachment::Color(n) if active.contains(n) => {
                    colors[*n as usize] = Some(texture.view.clone());
                    color_formats[*n as usize] = Some(texture.format);
                }
                Attachment::Color(_) => {}
                Attachment::Depth => {
                    if !texture.is_depth() {
                        return Err(Error::configuration(format!(
                            "depth attachment of frame buffer {:?} has color format {:?}",
                            frame_buffer.id(),
                            texture.format
                        )));
                    }
                    depth = Some((texture.view.clone(), texture.format));
                }
            }
        }

        let native_id = match &previous {
            Some(p) => p.native_id,
            None => {
                self.stats.frame_buffers_created += 1;
                NativeId(self.next_native_id())
            }
        };
        let handle = GpuFrameBuffer {
            native_id,
            width,
            height,
            colors,
            color_formats,
            depth,
            storage,
        };
        self.stats.frame_buffer_syncs += 1;
        log::debug!(
            "synced frame buffer {:?} ({}x{}, draw buffers {:?})",
            frame_buffer.id(),
            width,
            height,
            active
        );
        self.frame_buffers.insert(frame_buffer.id(), handle.clone());
        frame_buffer.set_needs_update(false);
        Ok(handle)
    }

    /// A 1x1 texture bound to sampler slots that have nothing staged.
    pub(crate) fn fallback_texture(&mut self, depth: bool) -> GpuTexture {
        let slot = if depth {
            &self.fallbacks.depth
        } else {
            &self.fallbacks.color
        };
        if let Some(texture) = slot {
            return texture.clone();
        }
        let format = if depth {
            wgpu::TextureFormat::Depth32Float
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let usage = if depth {
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("fallback texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        if !depth {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                &[0, 0, 0, 255],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4),
                    rows_per_image: Some(1),
                },
                size,
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let params = TextureParams {
            min_filter: crate::data_structures::texture::Filter::Nearest,
            mag_filter: crate::data_structures::texture::Filter::Nearest,
            ..Default::default()
        };
        let handle = GpuTexture {
            native_id: NativeId(self.next_native_id()),
            storage: self.next_native_id(),
            sync: self.next_native_id(),
            texture,
            view,
            sampler: create_sampler(&self.device, &params),
            format,
            width: 1,
            height: 1,
            mip_level_count: 1,
        };
        if depth {
            self.fallbacks.depth = Some(handle.clone());
        } else {
            self.fallbacks.color = Some(handle.clone());
        }
        handle
    }

    /// A shared `LessEqual` comparison sampler for `sampler_comparison` slots.
    pub(crate) fn comparison_sampler(&mut self) -> wgpu::Sampler {
        if let Some(sampler) = &self.fallbacks.comparison {
            return sampler.clone();
        }
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("comparison sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        self.fallbacks.comparison = Some(sampler.clone());
        sampler
    }

    /// Removes the entry of a retired texture and releases its native handle.
    pub fn release_texture(&mut self, texture: &Texture) {
        if let Some(handle) = self.textures.remove(&texture.id()) {
            handle.texture.destroy();
            texture.set_needs_update(true);
        }
    }

    pub fn release_geometry_buffer(&mut self, buffer: &GeometryBuffer) {
        if let Some(handle) = self.buffers.remove(&buffer.id()) {
            handle.buffer.destroy();
            buffer.set_needs_update(true);
        }
    }

    /// Forgets the attachment set. The attached textures stay cached.
    pub fn release_frame_buffer(&mut self, frame_buffer: &FrameBuffer) {
        if self.frame_buffers.remove(&frame_buffer.id()).is_some() {
            frame_buffer.set_needs_update(true);
        }
    }

    /// Releases every cached native handle. Descriptors used afterwards are
    /// recreated from scratch because their entries no longer exist.
    pub fn dispose(&mut self) {
        log::debug!(
            "disposing {} textures, {} buffers, {} frame buffers",
            self.textures.len(),
            self.buffers.len(),
            self.frame_buffers.len()
        );
        for (_, handle) in self.textures.drain() {
            handle.texture.destroy();
        }
        for (_, handle) in self.buffers.drain() {
            handle.buffer.destroy();
        }
        self.frame_buffers.clear();
        let fallbacks = std::mem::take(&mut self.fallbacks);
        for texture in [fallbacks.color, fallbacks.depth].into_iter().flatten() {
            texture.texture.destroy();
        }
    }
}

fn create_sampler(device: &wgpu::Device, params: &TextureParams) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("texture sampler"),
        address_mode_u: params.wrap_s.to_wgpu(),
        address_mode_v: params.wrap_t.to_wgpu(),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: params.mag_filter.to_wgpu(),
        min_filter: params.min_filter.to_wgpu(),
        ..Default::default()
    })
}

/// Writes `image` into level 0 and box-filtered halvings into the rest.
fn upload_mip_chain(queue: &wgpu::Queue, texture: &wgpu::Texture, image: RgbaImage, levels: u32) {
    let mut level_image = image;
    for level in 0..levels {
        if level > 0 {
            let width = (level_image.width() / 2).max(1);
            let height = (level_image.height() / 2).max(1);
            level_image = image::imageops::resize(
                &level_image,
                width,
                height,
                image::imageops::FilterType::Triangle,
            );
        }
        let (width, height) = level_image.dimensions();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
            },
            &level_image,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}
