//! deferred-ngin
//!
//! A deferred-shading 3D rendering core for native targets and WebGL2 through
//! wgpu. Scenes are retained trees of meshes and lights; a `ScenePass` renders
//! them into a G-buffer, accumulates every light additively and composites the
//! result. GPU objects are created lazily from CPU-side descriptors and only
//! re-uploaded when a descriptor is marked dirty.
//!
//! High-level modules
//! - `animator`: the frame driver and its winit host
//! - `context`: device bring-up, capabilities, viewport and pixel readback
//! - `data_structures`: descriptors (geometry, textures, frame buffers) and small value types
//! - `error`: the crate error taxonomy
//! - `passes`: the scene pass and full-screen effect passes
//! - `pipelines`: explicit raster state and render pipeline construction
//! - `resources`: asset loading and geometry builders
//! - `scene`: scene graph, camera, lights and materials
//! - `shader`: programs, reflected uniforms and attributes, the include library
//! - `state`: the descriptor-keyed GPU resource cache
//!

pub mod animator;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod passes;
pub mod pipelines;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod state;

// Re-exports commonly used types for convenience in downstream code.
pub use animator::{Animator, FrameClock, SizeParams, State, run};
pub use context::{Capabilities, ContextConfig, RenderingContext};
pub use error::{Error, Result};
pub use passes::{CopyEffect, Effect, EffectPass, PassStage, RenderPass, ScenePass, ScenePassConfig};
pub use state::RenderingState;
pub use cgmath;
pub use wgpu;
