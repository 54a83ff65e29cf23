//! CPU-side descriptors and small value types.
//!
//! Descriptors describe the contents of a GPU resource without owning it:
//!
//! - `geometry` holds named vertex attribute buffers
//! - `texture` holds image-backed textures and resizable render textures
//! - `frame_buffer` maps attachment points to render textures
//! - `color` and `bound` are small value types used by scenes and passes
//!
//! Each descriptor carries a stable identity and a dirty flag. The
//! [`RenderingState`](crate::state::RenderingState) maps identities to native
//! handles and re-uploads only when the flag is set.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod bound;
pub mod color;
pub mod frame_buffer;
pub mod geometry;
pub mod texture;

/// Identity of a descriptor. Clones of a descriptor share it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}
