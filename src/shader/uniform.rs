//! Typed uniform bindings with staged values.

use crate::{
    data_structures::texture::Texture,
    error::{Error, Result},
};

/// Every uniform kind a program can expose.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
}

impl UniformKind {
    pub fn name(&self) -> &'static str {
        match self {
            UniformKind::Bool => "bool",
            UniformKind::Int => "int",
            UniformKind::Float => "float",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec3 => "vec3",
            UniformKind::Vec4 => "vec4",
            UniformKind::Mat3 => "mat3",
            UniformKind::Mat4 => "mat4",
            UniformKind::Sampler2D => "sampler2D",
        }
    }
}

/// A staged uniform value.
#[derive(Clone, Debug)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
    Sampler2D(Option<Texture>),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Sampler2D(_) => UniformKind::Sampler2D,
        }
    }

    /// Writes the value into a uniform buffer at the start of `out`.
    ///
    /// Matrix columns are 16-byte aligned. Booleans are written as `u32`.
    pub(crate) fn write_std140(&self, out: &mut [u8]) {
        let mut put = |offset: usize, bytes: &[u8]| {
            out[offset..offset + bytes.len()].copy_from_slice(bytes);
        };
        match self {
            UniformValue::Bool(v) => put(0, bytemuck::bytes_of(&(*v as u32))),
            UniformValue::Int(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Float(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => put(0, bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => put(0, bytemuck::cast_slice(v)),
            UniformValue::Vec4(v) => put(0, bytemuck::cast_slice(v)),
            UniformValue::Mat3(columns) => {
                for (i, column) in columns.iter().enumerate() {
                    put(i * 16, bytemuck::cast_slice(column));
                }
            }
            UniformValue::Mat4(columns) => {
                for (i, column) in columns.iter().enumerate() {
                    put(i * 16, bytemuck::cast_slice(column));
                }
            }
            UniformValue::Sampler2D(_) => {}
        }
    }
}

/// Where a uniform's value lands when the program updates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum UniformSlot {
    /// A member of a uniform block at a byte offset.
    Block { block: usize, offset: u32 },
    /// A texture binding, with the index of its texture slot.
    Texture { slot: usize },
}

/// One active uniform of a program.
///
/// Setters only stage a value. It is applied by the owning program's
/// `update`. Calling a setter that does not match the uniform's kind fails
/// with [`Error::UnsupportedValue`].
#[derive(Clone, Debug)]
pub struct ShaderUniform {
    name: String,
    kind: UniformKind,
    pub(crate) slot: UniformSlot,
    /// Texture unit for sampler uniforms.
    unit: Option<u32>,
    pending: Option<UniformValue>,
}

impl ShaderUniform {
    pub(crate) fn new(name: String, kind: UniformKind, slot: UniformSlot, unit: Option<u32>) -> Self {
        Self {
            name,
            kind,
            slot,
            unit,
            pending: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UniformKind {
        self.kind
    }

    /// Texture unit assigned at construction, for sampler uniforms.
    pub fn texture_unit(&self) -> Option<u32> {
        self.unit
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn take_pending(&mut self) -> Option<UniformValue> {
        self.pending.take()
    }

    fn stage(&mut self, value: UniformValue) -> Result<()> {
        if value.kind() != self.kind {
            return Err(Error::UnsupportedValue {
                name: self.name.clone(),
                expected: self.kind.name().to_string(),
                got: value.kind().name().to_string(),
            });
        }
        self.pending = Some(value);
        Ok(())
    }

    pub fn set_bool(&mut self, value: bool) -> Result<()> {
        self.stage(UniformValue::Bool(value))
    }

    pub fn set_int(&mut self, value: i32) -> Result<()> {
        self.stage(UniformValue::Int(value))
    }

    pub fn set_float(&mut self, value: f32) -> Result<()> {
        self.stage(UniformValue::Float(value))
    }

    pub fn set_vec2(&mut self, value: impl Into<[f32; 2]>) -> Result<()> {
        self.stage(UniformValue::Vec2(value.into()))
    }

    pub fn set_vec3(&mut self, value: impl Into<[f32; 3]>) -> Result<()> {
        self.stage(UniformValue::Vec3(value.into()))
    }

    pub fn set_vec4(&mut self, value: impl Into<[f32; 4]>) -> Result<()> {
        self.stage(UniformValue::Vec4(value.into()))
    }

    pub fn set_mat3(&mut self, value: impl Into<[[f32; 3]; 3]>) -> Result<()> {
        self.stage(UniformValue::Mat3(value.into()))
    }

    pub fn set_mat4(&mut self, value: impl Into<[[f32; 4]; 4]>) -> Result<()> {
        self.stage(UniformValue::Mat4(value.into()))
    }

    /// Stages a texture, or `None` to bind the fallback texture.
    pub fn set_sampler_2d(&mut self, value: Option<&Texture>) -> Result<()> {
        self.stage(UniformValue::Sampler2D(value.cloned()))
    }
}
