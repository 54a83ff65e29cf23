//! Vertex attribute buffers and the geometries that group them.

use std::{
    cell::{Cell, Ref, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::{
    data_structures::ResourceId,
    error::{Error, Result},
};

struct BufferInner {
    id: ResourceId,
    data: RefCell<Vec<f32>>,
    data_size: u32,
    normalized: bool,
    count: u32,
    needs_update: Cell<bool>,
}

/// A flat `f32` vertex attribute buffer.
///
/// `data_size` is the number of components per vertex and `count` the number
/// of vertices. The count is fixed at construction; new data of a different
/// length requires a new buffer. Cloning shares identity.
#[derive(Clone)]
pub struct GeometryBuffer {
    inner: Rc<BufferInner>,
}

impl GeometryBuffer {
    pub fn new(data: Vec<f32>, data_size: u32) -> Result<Self> {
        Self::with_normalized(data, data_size, false)
    }

    /// `normalized` mirrors the vertex attribute flag; float payloads ignore it.
    pub fn with_normalized(data: Vec<f32>, data_size: u32, normalized: bool) -> Result<Self> {
        if data_size == 0 || data_size > 4 {
            return Err(Error::configuration(format!(
                "geometry buffer component count must be 1..=4, got {}",
                data_size
            )));
        }
        if data.len() % data_size as usize != 0 {
            return Err(Error::configuration(format!(
                "geometry buffer length {} is not a multiple of its component count {}",
                data.len(),
                data_size
            )));
        }
        let count = (data.len() / data_size as usize) as u32;
        Ok(Self {
            inner: Rc::new(BufferInner {
                id: ResourceId::next(),
                data: RefCell::new(data),
                data_size,
                normalized,
                count,
                needs_update: Cell::new(true),
            }),
        })
    }

    pub fn id(&self) -> ResourceId {
        self.inner.id
    }

    pub fn data(&self) -> Ref<'_, Vec<f32>> {
        self.inner.data.borrow()
    }

    pub fn data_size(&self) -> u32 {
        self.inner.data_size
    }

    pub fn normalized(&self) -> bool {
        self.inner.normalized
    }

    pub fn count(&self) -> u32 {
        self.inner.count
    }

    /// Replaces the payload in place. The vertex count cannot change.
    pub fn update_data(&self, data: Vec<f32>) -> Result<()> {
        if data.len() != self.inner.data.borrow().len() {
            return Err(Error::configuration(format!(
                "geometry buffer holds {} values, replacement has {}",
                self.inner.data.borrow().len(),
                data.len()
            )));
        }
        *self.inner.data.borrow_mut() = data;
        self.set_needs_update(true);
        Ok(())
    }

    pub fn needs_update(&self) -> bool {
        self.inner.needs_update.get()
    }

    pub fn set_needs_update(&self, value: bool) {
        self.inner.needs_update.set(value);
    }

    pub(crate) fn byte_len(&self) -> u64 {
        (self.inner.data.borrow().len() * std::mem::size_of::<f32>()) as u64
    }
}

impl std::fmt::Debug for GeometryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryBuffer")
            .field("id", &self.inner.id)
            .field("data_size", &self.inner.data_size)
            .field("count", &self.inner.count)
            .field("needs_update", &self.inner.needs_update.get())
            .finish()
    }
}

/// Named attribute buffers that together describe one mesh.
///
/// Every attached buffer shares the same vertex count.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    buffers: HashMap<String, GeometryBuffer>,
    count: u32,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `buffer` under `name`, replacing any buffer already there.
    pub fn add_buffer(&mut self, name: &str, buffer: GeometryBuffer) -> Result<()> {
        let mismatch = self
            .buffers
            .iter()
            .find(|(n, b)| n.as_str() != name && b.count() != buffer.count());
        if let Some((other, _)) = mismatch {
            return Err(Error::configuration(format!(
                "buffer \"{}\" has {} vertices but \"{}\" has {}",
                name,
                buffer.count(),
                other,
                self.count
            )));
        }
        self.count = buffer.count();
        self.buffers.insert(name.to_string(), buffer);
        Ok(())
    }

    pub fn remove_buffer(&mut self, name: &str) -> Option<GeometryBuffer> {
        let removed = self.buffers.remove(name);
        if self.buffers.is_empty() {
            self.count = 0;
        }
        removed
    }

    pub fn buffer(&self, name: &str) -> Option<&GeometryBuffer> {
        self.buffers.get(name)
    }

    pub fn buffers(&self) -> impl Iterator<Item = (&str, &GeometryBuffer)> {
        self.buffers.iter().map(|(name, buffer)| (name.as_str(), buffer))
    }

    /// Vertex count shared by all buffers, or 0 for an empty geometry.
    pub fn count(&self) -> u32 {
        self.count
    }
}
