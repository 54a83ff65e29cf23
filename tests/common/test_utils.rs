#![allow(dead_code)]

use cgmath::{Matrix4, Vector3};
use deferred_ngin::{
    data_structures::color::Color,
    scene::{AmbientLight, DirectionalLight, PointLight, SceneObject},
};

pub(crate) fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::new(x, y, z))
}

pub(crate) fn assert_matrix_eq(actual: Matrix4<f32>, expected: Matrix4<f32>) {
    let a: &[f32; 16] = actual.as_ref();
    let e: &[f32; 16] = expected.as_ref();
    for (i, (a, e)) in a.iter().zip(e.iter()).enumerate() {
        assert!(
            (a - e).abs() < 1e-5,
            "matrix element {} differs: {} vs {}\nactual {:?}\nexpected {:?}",
            i,
            a,
            e,
            actual,
            expected
        );
    }
}

pub(crate) fn ambient(intensity: f32) -> SceneObject {
    SceneObject::ambient_light(AmbientLight::new(Color::WHITE, intensity))
}

pub(crate) fn directional(direction: Vector3<f32>) -> SceneObject {
    SceneObject::directional_light(DirectionalLight::new(Color::WHITE, 1.0, direction))
}

pub(crate) fn point(intensity: f32) -> SceneObject {
    SceneObject::point_light(PointLight::new(Color::WHITE, intensity, 2.0))
}

pub(crate) fn kind_name(object: &SceneObject) -> &'static str {
    object.kind().name()
}

#[cfg(feature = "integration-tests")]
pub(crate) fn headless_context(width: u32, height: u32) -> deferred_ngin::RenderingContext {
    use deferred_ngin::{ContextConfig, RenderingContext};

    let _ = env_logger::builder().is_test(true).try_init();
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    runtime
        .block_on(RenderingContext::headless(ContextConfig {
            width,
            height,
            ..Default::default()
        }))
        .expect("headless rendering context")
}

#[cfg(feature = "integration-tests")]
pub(crate) fn read_pixels(
    ctx: &mut deferred_ngin::RenderingContext,
    texture: &deferred_ngin::data_structures::texture::RenderTexture,
) -> image::RgbaImage {
    futures::executor::block_on(ctx.read_pixels(texture)).expect("pixel readback")
}

/// Asserts every channel of `pixel` is within `tolerance` of `expected` in 0..1 units.
#[cfg(feature = "integration-tests")]
pub(crate) fn assert_pixel_near(pixel: image::Rgba<u8>, expected: [f32; 3], tolerance: f32) {
    for (channel, (got, want)) in pixel.0.iter().zip(expected.iter()).enumerate() {
        let got = *got as f32 / 255.0;
        assert!(
            (got - want).abs() <= tolerance,
            "channel {} is {} but expected {} (pixel {:?})",
            channel,
            got,
            want,
            pixel
        );
    }
}
