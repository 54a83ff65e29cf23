//! GPU bring-up and the context every pass renders through.
//!
//! A [`RenderingContext`] owns the wgpu device, the optional window surface
//! and the [`RenderingState`] cache. It also tracks the pixel viewport derived
//! from the configured size and pixel ratio.

use std::sync::Arc;

use winit::window::Window;

use crate::{
    data_structures::{bound::Viewport, color::Color, texture::RenderTexture},
    error::{Error, Result},
    shader::ShaderLimits,
    state::{GpuFrameBuffer, RenderingState},
};

/// Initial size and appearance of a context.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContextConfig {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub clear_color: Color,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            pixel_ratio: 1.0,
            clear_color: Color::BLACK,
        }
    }
}

/// What the device can do, checked once at creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Format of depth targets that are sampled later (G-buffer depth and shadow maps).
    pub depth_format: wgpu::TextureFormat,
    pub max_color_attachments: u32,
    pub max_texture_units: u32,
}

impl Capabilities {
    fn probe(adapter: &wgpu::Adapter, device: &wgpu::Device) -> Result<Self> {
        let limits = device.limits();
        if limits.max_color_attachments < 2 {
            return Err(Error::configuration(format!(
                "deferred shading needs 2 color attachments, the device supports {}",
                limits.max_color_attachments
            )));
        }
        let wanted = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let depth_format = if adapter
            .get_texture_format_features(wgpu::TextureFormat::Depth32Float)
            .allowed_usages
            .contains(wanted)
        {
            wgpu::TextureFormat::Depth32Float
        } else {
            log::warn!("Depth32Float cannot be sampled, shadows fall back to Depth16Unorm");
            wgpu::TextureFormat::Depth16Unorm
        };
        Ok(Self {
            depth_format,
            max_color_attachments: limits.max_color_attachments,
            max_texture_units: ShaderLimits::from_device(device).max_texture_units,
        })
    }
}

struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

/// A device, its resource cache and an optional presentation surface.
pub struct RenderingContext {
    surface: Option<SurfaceTarget>,
    state: RenderingState,
    capabilities: Capabilities,
    config: ContextConfig,
    viewport: Viewport,
}

impl RenderingContext {
    /// Creates a context presenting to `window`.
    pub async fn new(window: Arc<Window>, config: ContextConfig) -> Result<Self> {
        let instance = create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| Error::resource("surface", e.to_string()))?;
        let adapter = request_adapter(&instance, Some(&surface)).await?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| *f == wgpu::TextureFormat::Rgba8Unorm || *f == wgpu::TextureFormat::Bgra8Unorm)
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| Error::resource("surface", "adapter reports no surface formats"))?;
        let viewport = viewport_of(&config);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width,
            height: viewport.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let capabilities = Capabilities::probe(&adapter, &device)?;
        log::info!(
            "rendering context on {:?}: {:?}, surface {:?}",
            adapter.get_info().backend,
            capabilities,
            format
        );
        Ok(Self {
            surface: Some(SurfaceTarget {
                surface,
                config: surface_config,
            }),
            state: RenderingState::new(device, queue),
            capabilities,
            config,
            viewport,
        })
    }

    /// Creates a context without a surface. Passes render into their own
    /// textures, which can be read back with [`RenderingContext::read_pixels`].
    pub async fn headless(config: ContextConfig) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, None).await?;
        let (device, queue) = request_device(&adapter).await?;
        let capabilities = Capabilities::probe(&adapter, &device)?;
        log::info!(
            "headless rendering context on {:?}: {:?}",
            adapter.get_info().backend,
            capabilities
        );
        Ok(Self {
            surface: None,
            state: RenderingState::new(device, queue),
            capabilities,
            config,
            viewport: viewport_of(&config),
        })
    }

    pub fn state(&self) -> &RenderingState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RenderingState {
        &mut self.state
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Resizes the drawing buffer in CSS pixels.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.apply_viewport();
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.config.pixel_ratio = pixel_ratio;
        self.apply_viewport();
    }

    fn apply_viewport(&mut self) {
        self.viewport = viewport_of(&self.config);
        if let Some(target) = &mut self.surface {
            target.config.width = self.viewport.width;
            target.config.height = self.viewport.height;
            target.surface.configure(self.state.device(), &target.config);
        }
        log::debug!("viewport is now {:?}", self.viewport);
    }

    /// Acquires the next surface texture. Headless contexts return `None`.
    pub fn acquire_frame(&self) -> Result<Option<(wgpu::SurfaceTexture, GpuFrameBuffer)>> {
        let Some(target) = &self.surface else {
            return Ok(None);
        };
        let frame = match target.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(frame)
            | wgpu::CurrentSurfaceTexture::Suboptimal(frame) => frame,
            other => return Err(Error::resource("surface texture", format!("{:?}", other))),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let frame_buffer = GpuFrameBuffer::from_view(
            view,
            target.config.format,
            target.config.width,
            target.config.height,
        );
        Ok(Some((frame, frame_buffer)))
    }

    /// Copies an 8-bit RGBA render texture back to the CPU.
    pub async fn read_pixels(&mut self, texture: &RenderTexture) -> Result<image::RgbaImage> {
        let format = texture.format();
        if !matches!(
            format,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
        ) {
            return Err(Error::configuration(format!(
                "read_pixels needs an 8-bit RGBA texture, not {:?}",
                format
            )));
        }
        let gpu = self.state.get_texture(texture.texture())?;
        let (width, height) = (gpu.width, gpu.height);
        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let device = self.state.device();
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read pixels buffer"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("read pixels encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            gpu.extent(),
        );
        self.state.queue().submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| Error::resource("pixel readback", e.to_string()))?;
        rx.receive()
            .await
            .ok_or_else(|| Error::resource("pixel readback", "map callback dropped"))?
            .map_err(|e| Error::resource("pixel readback", e.to_string()))?;

        let pixels: Vec<u8> = {
            let data = buffer_slice.get_mapped_range();
            data.chunks(padded as usize)
                .flat_map(|row| row[..unpadded as usize].iter().copied())
                .collect()
        };
        output_buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::resource("pixel readback", "short pixel buffer"))
    }
}

fn viewport_of(config: &ContextConfig) -> Viewport {
    let scale = |size: u32| ((size as f32 * config.pixel_ratio).floor() as u32).max(1);
    Viewport::new(0, 0, scale(config.width), scale(config.height))
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..wgpu::InstanceDescriptor::new_without_display_handle()
    })
}

async fn request_adapter(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
) -> Result<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| Error::resource("adapter", e.to_string()))
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL2 caps fewer resources than the native defaults.
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| Error::resource("device", e.to_string()))
}

