//! Source fragments shared by the built-in programs.

use crate::shader::library::ShaderLibrary;

pub const FULL_SCREEN_VARYINGS: &str = include_str!("chunks/full_screen_varyings.wgsl");
pub const MESH_VARYINGS: &str = include_str!("chunks/mesh_varyings.wgsl");
pub const GBUFFER: &str = include_str!("chunks/gbuffer.wgsl");

/// A library holding `full_screen_varyings`, `mesh_varyings` and `gbuffer`.
///
/// Link it into an application library to reuse the renderer's varyings and
/// G-buffer helpers in custom materials.
pub fn builtin_library() -> ShaderLibrary {
    let mut library = ShaderLibrary::new();
    library.set("full_screen_varyings", FULL_SCREEN_VARYINGS);
    library.set("mesh_varyings", MESH_VARYINGS);
    library.set("gbuffer", GBUFFER);
    library
}
