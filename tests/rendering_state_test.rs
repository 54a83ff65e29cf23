#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn textures_are_created_once_and_synced_when_dirty() {
    use deferred_ngin::data_structures::texture::Texture;

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(32, 32);
    let state = ctx.state_mut();
    let texture = Texture::from_image(image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255])));

    let first = state.get_texture(&texture).unwrap();
    let second = state.get_texture(&texture).unwrap();
    assert_eq!(first.native_id, second.native_id);
    assert_eq!(first.storage, second.storage);
    assert_eq!(state.stats().textures_created, 1);
    assert_eq!(state.stats().texture_syncs, 1);
    assert!(!texture.needs_update());
    // 4x4 with mipmaps: 4, 2, 1
    assert_eq!(first.mip_level_count, 3);

    texture.set_needs_update(true);
    let third = state.get_texture(&texture).unwrap();
    assert_eq!(third.native_id, first.native_id);
    assert_eq!(third.storage, first.storage);
    assert_eq!(state.stats().textures_created, 1);
    assert_eq!(state.stats().texture_syncs, 2);
}

#[test]
#[cfg(feature = "integration-tests")]
fn resizing_replaces_storage_but_keeps_identity() {
    use deferred_ngin::data_structures::texture::{RenderTexture, Resizable};

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(32, 32);
    let state = ctx.state_mut();
    let target = RenderTexture::new(16, 16, wgpu::TextureFormat::Rgba8Unorm);

    let before = state.get_texture(target.texture()).unwrap();
    target.set_size(16, 16);
    let unchanged = state.get_texture(target.texture()).unwrap();
    assert_eq!(unchanged.storage, before.storage);

    target.set_size(24, 8);
    let after = state.get_texture(target.texture()).unwrap();
    assert_eq!(after.native_id, before.native_id);
    assert_ne!(after.storage, before.storage);
    assert_eq!((after.width, after.height), (24, 8));
    assert_eq!(state.stats().textures_created, 1);
}

#[test]
#[cfg(feature = "integration-tests")]
fn geometry_buffers_upload_on_change_only() {
    use deferred_ngin::data_structures::geometry::GeometryBuffer;

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(32, 32);
    let state = ctx.state_mut();
    let buffer = GeometryBuffer::new(vec![0.0; 9], 3).unwrap();

    let first = state.get_geometry_buffer(&buffer).unwrap();
    state.get_geometry_buffer(&buffer).unwrap();
    assert_eq!(state.stats().buffers_created, 1);
    assert_eq!(state.stats().buffer_syncs, 1);
    assert_eq!(first.size, 36);

    buffer.update_data(vec![1.0; 9]).unwrap();
    let second = state.get_geometry_buffer(&buffer).unwrap();
    assert_eq!(second.native_id, first.native_id);
    assert_eq!(state.stats().buffers_created, 1);
    assert_eq!(state.stats().buffer_syncs, 2);
}

#[test]
#[cfg(feature = "integration-tests")]
fn empty_geometry_buffers_still_get_a_native_buffer() {
    use deferred_ngin::data_structures::geometry::GeometryBuffer;

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(32, 32);
    let state = ctx.state_mut();
    let buffer = GeometryBuffer::new(Vec::new(), 3).unwrap();

    let handle = state.get_geometry_buffer(&buffer).unwrap();
    assert_eq!(handle.size, 0);
    assert!(handle.buffer.size() > 0);
    assert_eq!(state.stats().buffers_created, 1);
    assert!(!buffer.needs_update());
}

#[test]
#[cfg(feature = "integration-tests")]
fn released_handles_are_recreated() {
    use deferred_ngin::data_structures::{
        geometry::GeometryBuffer,
        texture::Texture,
    };

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(32, 32);
    let state = ctx.state_mut();
    let texture = Texture::from_image(image::RgbaImage::new(2, 2));
    let buffer = GeometryBuffer::new(vec![0.0; 4], 2).unwrap();
    let before = state.get_texture(&texture).unwrap();
    state.get_geometry_buffer(&buffer).unwrap();

    state.release_texture(&texture);
    state.release_geometry_buffer(&buffer);
    let after = state.get_texture(&texture).unwrap();
    state.get_geometry_buffer(&buffer).unwrap();

    assert_ne!(after.native_id, before.native_id);
    assert_eq!(state.stats().textures_created, 2);
    assert_eq!(state.stats().buffers_created, 2);

    state.dispose();
    state.get_texture(&texture).unwrap();
    assert_eq!(state.stats().textures_created, 3);
}

#[test]
#[cfg(feature = "integration-tests")]
fn frame_buffers_follow_their_attachments() {
    use deferred_ngin::data_structures::{
        frame_buffer::{Attachment, FrameBuffer},
        texture::{RenderTexture, Resizable},
    };

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(32, 32);
    let depth_format = ctx.capabilities().depth_format;
    let state = ctx.state_mut();
    let color = RenderTexture::new(8, 8, wgpu::TextureFormat::Rgba8Unorm);
    let depth = RenderTexture::new(8, 8, depth_format);
    let frame_buffer = FrameBuffer::new()
        .with_attachment(Attachment::Color(0), color.clone())
        .with_attachment(Attachment::Depth, depth.clone());

    let first = state.get_frame_buffer(&frame_buffer).unwrap();
    state.get_frame_buffer(&frame_buffer).unwrap();
    assert_eq!(state.stats().frame_buffers_created, 1);
    let syncs = state.stats().frame_buffer_syncs;
    assert_eq!(
        first.layout().color_formats,
        vec![Some(wgpu::TextureFormat::Rgba8Unorm)]
    );
    assert_eq!(first.layout().depth_format, Some(depth_format));

    color.set_size(16, 16);
    assert!(matches!(
        state.get_frame_buffer(&frame_buffer),
        Err(deferred_ngin::Error::Configuration(_))
    ));
    depth.set_size(16, 16);
    state.get_frame_buffer(&frame_buffer).unwrap();
    assert_eq!(state.stats().frame_buffers_created, 1);
    assert_eq!(state.stats().frame_buffer_syncs, syncs + 1);
}

#[test]
#[cfg(feature = "integration-tests")]
fn context_viewport_follows_size_and_pixel_ratio() {
    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(100, 50);
    assert_eq!((ctx.viewport().width, ctx.viewport().height), (100, 50));

    ctx.set_pixel_ratio(1.5);
    assert_eq!((ctx.viewport().width, ctx.viewport().height), (150, 75));

    ctx.set_size(0, 0);
    assert_eq!((ctx.viewport().width, ctx.viewport().height), (1, 1));
    assert!(ctx.capabilities().max_color_attachments >= 2);
}

#[test]
#[cfg(feature = "integration-tests")]
fn bound_textures_rebind_after_a_param_change() {
    use cgmath::{Matrix4, SquareMatrix};
    use deferred_ngin::{
        data_structures::texture::{Filter, Texture, Wrap},
        resources::build_plane_geometry,
        shader::{ShaderProgram, builtin_library},
    };

    use crate::common::test_utils::headless_context;

    const VERTEX: &str = "
#include <full_screen_varyings>

@group(0) @binding(0)
var<uniform> output_projection: mat4x4<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.uv = model.uv;
    out.clip_position = output_projection * vec4<f32>(model.position, 1.0);
    return out;
}
";
    const FRAGMENT: &str = "
#include <full_screen_varyings>

@group(1) @binding(0)
var albedo: texture_2d<f32>;
@group(1) @binding(1)
var albedo_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, in.uv);
}
";

    let mut ctx = headless_context(32, 32);
    let state = ctx.state_mut();
    let mut program = ShaderProgram::new(state, VERTEX, FRAGMENT, Some(&builtin_library())).unwrap();
    let quad = build_plane_geometry(1.0, 1.0).unwrap();
    let texture = Texture::from_image(image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 255, 0, 255])));
    texture.update_params(|params| {
        params.wrap_s = Wrap::ClampToEdge;
        params.min_filter = Filter::Nearest;
        params.mag_filter = Filter::Nearest;
    });

    program
        .uniform("output_projection")
        .unwrap()
        .set_mat4(Matrix4::<f32>::identity())
        .unwrap();
    program.attribute("position").unwrap().set_vec3(quad.buffer("vertex")).unwrap();
    program.attribute("uv").unwrap().set_vec2(quad.buffer("uv")).unwrap();
    program.uniform("albedo").unwrap().set_sampler_2d(Some(&texture)).unwrap();

    program.update(state).unwrap();
    let bound = state.stats().bind_groups_created;
    let first = state.get_texture(&texture).unwrap();
    program.update(state).unwrap();
    assert_eq!(state.stats().bind_groups_created, bound);

    texture.update_params(|params| {
        params.wrap_s = Wrap::Repeat;
        params.min_filter = Filter::Linear;
        params.mag_filter = Filter::Linear;
    });
    program.update(state).unwrap();
    let second = state.get_texture(&texture).unwrap();
    assert_eq!(second.native_id, first.native_id);
    assert_eq!(second.storage, first.storage);
    assert_ne!(second.sync, first.sync);
    // only the texture group is rebuilt
    assert_eq!(state.stats().bind_groups_created, bound + 1);
}
