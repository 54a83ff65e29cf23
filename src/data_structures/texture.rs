//! Texture descriptors.
//!
//! A [`Texture`] describes either an uploaded image or empty storage of a
//! given size. [`RenderTexture`] is the render-target flavour: it always has
//! empty storage, defaults to nearest filtering and can be resized through
//! [`Resizable`].

use std::{
    cell::{Cell, Ref, RefCell},
    rc::Rc,
    sync::Arc,
};

use crate::data_structures::ResourceId;

/// Texture coordinate wrapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl Wrap {
    pub(crate) fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            Wrap::Repeat => wgpu::AddressMode::Repeat,
            Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

impl Filter {
    pub(crate) fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Where the texel data comes from.
#[derive(Clone, Debug)]
pub enum TextureSource {
    /// A decoded image, uploaded on sync.
    Image(Arc<image::RgbaImage>),
    /// Uninitialized storage of the given size, used by render targets.
    Empty { width: u32, height: u32 },
}

/// Sampling and storage parameters of a texture.
#[derive(Clone, Debug)]
pub struct TextureParams {
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub format: wgpu::TextureFormat,
    /// Flips the image vertically before upload.
    pub flip_y: bool,
    pub generate_mipmaps: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            wrap_s: Wrap::ClampToEdge,
            wrap_t: Wrap::ClampToEdge,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            format: wgpu::TextureFormat::Rgba8Unorm,
            flip_y: false,
            generate_mipmaps: true,
        }
    }
}

struct TextureInner {
    id: ResourceId,
    source: RefCell<TextureSource>,
    params: RefCell<TextureParams>,
    needs_update: Cell<bool>,
}

/// Descriptor of a 2D texture. Cloning shares identity.
#[derive(Clone)]
pub struct Texture {
    inner: Rc<TextureInner>,
}

impl Texture {
    pub fn new(source: TextureSource, params: TextureParams) -> Self {
        Self {
            inner: Rc::new(TextureInner {
                id: ResourceId::next(),
                source: RefCell::new(source),
                params: RefCell::new(params),
                needs_update: Cell::new(true),
            }),
        }
    }

    pub fn from_image(image: image::RgbaImage) -> Self {
        Self::new(TextureSource::Image(Arc::new(image)), TextureParams::default())
    }

    pub fn id(&self) -> ResourceId {
        self.inner.id
    }

    pub fn source(&self) -> Ref<'_, TextureSource> {
        self.inner.source.borrow()
    }

    pub fn params(&self) -> Ref<'_, TextureParams> {
        self.inner.params.borrow()
    }

    /// Replaces the texel source and marks the texture dirty.
    pub fn set_source(&self, source: TextureSource) {
        *self.inner.source.borrow_mut() = source;
        self.set_needs_update(true);
    }

    /// Edits the parameters in place and marks the texture dirty.
    pub fn update_params(&self, edit: impl FnOnce(&mut TextureParams)) {
        edit(&mut self.inner.params.borrow_mut());
        self.set_needs_update(true);
    }

    pub fn size(&self) -> (u32, u32) {
        match &*self.inner.source.borrow() {
            TextureSource::Image(image) => image.dimensions(),
            TextureSource::Empty { width, height } => (*width, *height),
        }
    }

    pub fn needs_update(&self) -> bool {
        self.inner.needs_update.get()
    }

    pub fn set_needs_update(&self, value: bool) {
        self.inner.needs_update.set(value);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.inner.id)
            .field("size", &self.size())
            .field("needs_update", &self.inner.needs_update.get())
            .finish()
    }
}

/// Render targets whose storage follows an externally chosen size.
pub trait Resizable {
    fn size(&self) -> (u32, u32);

    /// Resizes the storage. Marks the descriptor dirty only when the size changes.
    fn set_size(&self, width: u32, height: u32);
}

/// A texture with empty storage that passes render into.
#[derive(Clone, Debug)]
pub struct RenderTexture {
    texture: Texture,
}

impl RenderTexture {
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let params = TextureParams {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            format,
            generate_mipmaps: false,
            ..Default::default()
        };
        Self {
            texture: Texture::new(TextureSource::Empty { width, height }, params),
        }
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.params().format
    }
}

impl Resizable for RenderTexture {
    fn size(&self) -> (u32, u32) {
        self.texture.size()
    }

    fn set_size(&self, width: u32, height: u32) {
        if self.texture.size() != (width, height) {
            self.texture
                .set_source(TextureSource::Empty { width, height });
        }
    }
}

impl AsRef<Texture> for RenderTexture {
    fn as_ref(&self) -> &Texture {
        &self.texture
    }
}
