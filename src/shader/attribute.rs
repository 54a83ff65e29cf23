use crate::{
    data_structures::geometry::GeometryBuffer,
    error::{Error, Result},
};

/// Vertex input kinds. Each is fed by a float buffer of matching width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl AttributeKind {
    pub fn components(&self) -> u32 {
        match self {
            AttributeKind::Float => 1,
            AttributeKind::Vec2 => 2,
            AttributeKind::Vec3 => 3,
            AttributeKind::Vec4 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Float => "float",
            AttributeKind::Vec2 => "vec2",
            AttributeKind::Vec3 => "vec3",
            AttributeKind::Vec4 => "vec4",
        }
    }

    pub(crate) fn vertex_format(&self) -> wgpu::VertexFormat {
        match self {
            AttributeKind::Float => wgpu::VertexFormat::Float32,
            AttributeKind::Vec2 => wgpu::VertexFormat::Float32x2,
            AttributeKind::Vec3 => wgpu::VertexFormat::Float32x3,
            AttributeKind::Vec4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

/// One active vertex input of a program, fed from its own vertex buffer slot.
#[derive(Clone, Debug)]
pub struct ShaderAttribute {
    name: String,
    kind: AttributeKind,
    location: u32,
    /// Vertex buffer slot, the attribute's index in location order.
    pub(crate) slot: u32,
    buffer: Option<GeometryBuffer>,
}

impl ShaderAttribute {
    pub(crate) fn new(name: String, kind: AttributeKind, location: u32, slot: u32) -> Self {
        Self {
            name,
            kind,
            location,
            slot,
            buffer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn buffer(&self) -> Option<&GeometryBuffer> {
        self.buffer.as_ref()
    }

    fn stage(&mut self, kind: AttributeKind, buffer: Option<&GeometryBuffer>) -> Result<()> {
        let unsupported = |got: String| Error::UnsupportedValue {
            name: self.name.clone(),
            expected: self.kind.name().to_string(),
            got,
        };
        if kind != self.kind {
            return Err(unsupported(kind.name().to_string()));
        }
        if let Some(buffer) = buffer {
            if buffer.data_size() != kind.components() {
                return Err(unsupported(format!(
                    "buffer with {} components",
                    buffer.data_size()
                )));
            }
        }
        self.buffer = buffer.cloned();
        Ok(())
    }

    /// Stages `buffer` for whatever kind this attribute has.
    pub fn set_buffer(&mut self, buffer: Option<&GeometryBuffer>) -> Result<()> {
        self.stage(self.kind, buffer)
    }

    pub fn set_float(&mut self, buffer: Option<&GeometryBuffer>) -> Result<()> {
        self.stage(AttributeKind::Float, buffer)
    }

    pub fn set_vec2(&mut self, buffer: Option<&GeometryBuffer>) -> Result<()> {
        self.stage(AttributeKind::Vec2, buffer)
    }

    pub fn set_vec3(&mut self, buffer: Option<&GeometryBuffer>) -> Result<()> {
        self.stage(AttributeKind::Vec3, buffer)
    }

    pub fn set_vec4(&mut self, buffer: Option<&GeometryBuffer>) -> Result<()> {
        self.stage(AttributeKind::Vec4, buffer)
    }
}
