//! Shader programs and their typed bindings.
//!
//! - [`library`]: `#include <name>` expansion against named source fragments
//! - [`interface`]: compile, link and reflection of a WGSL stage pair
//! - [`program`]: pipelines, uniform rings and draw submission
//! - [`uniform`] and [`attribute`]: the staged per-binding setters

pub mod attribute;
pub mod builtin;
pub mod interface;
pub mod library;
pub mod program;
pub mod uniform;

pub use attribute::{AttributeKind, ShaderAttribute};
pub use builtin::builtin_library;
pub use interface::{ShaderInterface, ShaderLimits};
pub use library::ShaderLibrary;
pub use program::ShaderProgram;
pub use uniform::{ShaderUniform, UniformKind, UniformValue};
