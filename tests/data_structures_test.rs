use deferred_ngin::data_structures::{
    bound::{Bound2, Viewport},
    color::Color,
    frame_buffer::{Attachment, FrameBuffer},
    texture::{RenderTexture, Resizable, Texture, TextureSource},
};

#[test]
fn colors_parse_from_hex() {
    assert_eq!(Color::from_hex(0xff0000), Color::new(1.0, 0.0, 0.0));
    assert_eq!(Color::from_hex(0x00ff00), Color::new(0.0, 1.0, 0.0));
    assert_eq!(Color::from_hex_str("#0000ff"), Some(Color::new(0.0, 0.0, 1.0)));
    assert_eq!(Color::from_hex_str("fff"), Some(Color::WHITE));
    assert_eq!(Color::from_hex_str("#f0f"), Some(Color::new(1.0, 0.0, 1.0)));
    assert_eq!(Color::from_hex_str("#12345"), None);
    assert_eq!(Color::from_hex_str("zzzzzz"), None);
}

#[test]
fn scaled_colors_multiply_every_channel() {
    let color = Color::new(0.2, 0.4, 0.8).scale(0.5);
    let channels: [f32; 3] = color.into();
    assert_eq!(channels, [0.1, 0.2, 0.4]);
}

#[test]
fn full_bound_covers_the_whole_target() {
    assert_eq!(Bound2::default().to_scissor(640, 480), (0, 0, 640, 480));
}

#[test]
fn bounds_flip_to_a_top_left_origin() {
    // bottom-left quarter
    let bound = Bound2::new(0.0, 0.0, 0.5, 0.5);
    assert_eq!(bound.to_scissor(200, 100), (0, 50, 100, 50));
    // top-right quarter
    let bound = Bound2::new(0.5, 0.5, 0.5, 0.5);
    assert_eq!(bound.to_scissor(200, 100), (100, 0, 100, 50));
}

#[test]
fn bounds_are_clamped_to_the_target() {
    let bound = Bound2::new(0.75, -0.5, 1.0, 1.0);
    let (x, y, w, h) = bound.to_scissor(100, 100);
    assert_eq!((x, y), (75, 50));
    assert!(x + w <= 100);
    assert!(y + h <= 100);
}

#[test]
fn viewport_offsets_shrink_the_target() {
    assert_eq!(Viewport::new(0, 0, 64, 32).target_size(), (64, 32));
    assert_eq!(Viewport::new(16, 8, 64, 32).target_size(), (48, 24));
    assert_eq!(Viewport::new(80, 0, 64, 32).target_size(), (1, 32));
}

#[test]
fn resizing_a_render_texture_marks_it_dirty_only_on_change() {
    let target = RenderTexture::new(64, 32, wgpu::TextureFormat::Rgba8Unorm);
    let texture = target.texture().clone();
    texture.set_needs_update(false);

    target.set_size(64, 32);
    assert!(!texture.needs_update());

    target.set_size(128, 32);
    assert!(texture.needs_update());
    assert_eq!(target.size(), (128, 32));
}

#[test]
fn textures_report_the_size_of_their_source() {
    let image = image::RgbaImage::new(3, 5);
    let texture = Texture::from_image(image);
    assert_eq!(texture.size(), (3, 5));

    texture.set_needs_update(false);
    texture.set_source(TextureSource::Empty {
        width: 7,
        height: 9,
    });
    assert_eq!(texture.size(), (7, 9));
    assert!(texture.needs_update());

    texture.set_needs_update(false);
    texture.update_params(|params| params.flip_y = true);
    assert!(texture.params().flip_y);
    assert!(texture.needs_update());
}

#[test]
fn draw_buffers_select_active_color_attachments() {
    let mut frame_buffer = FrameBuffer::new()
        .with_attachment(
            Attachment::Color(1),
            RenderTexture::new(4, 4, wgpu::TextureFormat::Rgba8Unorm),
        )
        .with_attachment(
            Attachment::Color(0),
            RenderTexture::new(4, 4, wgpu::TextureFormat::Rgba8Unorm),
        )
        .with_attachment(
            Attachment::Depth,
            RenderTexture::new(4, 4, wgpu::TextureFormat::Depth32Float),
        );
    assert_eq!(frame_buffer.active_color_attachments(), vec![0, 1]);

    frame_buffer.set_needs_update(false);
    frame_buffer.set_draw_buffers(Some(vec![
        Attachment::Color(1),
        Attachment::Color(3),
        Attachment::Depth,
    ]));
    assert!(frame_buffer.needs_update());
    assert_eq!(frame_buffer.active_color_attachments(), vec![1]);

    frame_buffer.set_draw_buffers(Some(Vec::new()));
    assert!(frame_buffer.active_color_attachments().is_empty());
}
