//! Render passes.
//!
//! Passes own their working textures and programs and draw through a
//! [`RenderingContext`](crate::context::RenderingContext). Every pass records
//! its work into one command encoder per call and submits it before returning.

pub mod effect_pass;
pub mod render_pass;
pub mod scene_pass;

pub use effect_pass::{CopyEffect, Effect, EffectPass};
pub use render_pass::{RenderPass, output_projection};
pub use scene_pass::{PassStage, ScenePass, ScenePassConfig};
