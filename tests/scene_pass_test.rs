#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod fixtures {
    use cgmath::{Deg, InnerSpace, Matrix4, Point3, Vector3};
    use deferred_ngin::{
        RenderingContext,
        data_structures::color::Color,
        resources::{build_box_geometry, build_plane_geometry},
        scene::{
            AmbientLight, Camera, DirectionalLight, Mesh, PointLight, Scene, SceneObject,
            SimpleMaterial,
        },
    };

    pub(crate) fn flat_mesh(
        ctx: &RenderingContext,
        geometry: deferred_ngin::data_structures::geometry::Geometry,
        color: Color,
    ) -> SceneObject {
        let material = SimpleMaterial::new(ctx.state())
            .unwrap()
            .with_color(color)
            .shared();
        SceneObject::mesh(Mesh::new(geometry, material))
    }

    /// A unit plane facing a camera that frames it exactly.
    pub(crate) fn framed_plane(ctx: &RenderingContext, color: Color) -> (Scene, Camera) {
        let scene = Scene::new();
        scene
            .add(&flat_mesh(ctx, build_plane_geometry(1.0, 1.0).unwrap(), color))
            .unwrap();
        let mut camera = Camera::orthographic(-0.5, 0.5, -0.5, 0.5, 0.1, 10.0);
        camera.look_at(Point3::new(0.0, 0.0, 5.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
        (scene, camera)
    }

    /// A white floor in the XZ plane with a box hovering over its center, seen from above.
    pub(crate) fn floor_with_occluder(ctx: &RenderingContext, shadows: bool) -> (Scene, Camera) {
        let scene = Scene::new();
        let floor = flat_mesh(ctx, build_plane_geometry(4.0, 4.0).unwrap(), Color::WHITE);
        floor.set_matrix(Matrix4::from_angle_x(Deg(-90.0)));
        let occluder = flat_mesh(ctx, build_box_geometry(1.0, 1.0, 1.0).unwrap(), Color::WHITE);
        occluder.set_matrix(Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0)));
        let sun = SceneObject::directional_light(
            DirectionalLight::new(Color::WHITE, 1.0, Vector3::new(1.0, 1.0, 0.0).normalize())
                .with_shadows(shadows),
        );
        scene.add(&floor).unwrap();
        scene.add(&occluder).unwrap();
        scene.add(&sun).unwrap();

        let mut camera = Camera::orthographic(-2.0, 2.0, -2.0, 2.0, 0.1, 10.0);
        camera.look_at(Point3::new(0.0, 5.0, 0.0), Point3::new(0.0, 0.0, 0.0), -Vector3::unit_z());
        (scene, camera)
    }

    pub(crate) fn all_lights() -> Vec<SceneObject> {
        vec![
            SceneObject::point_light(PointLight::new(Color::WHITE, 1.0, 2.0)),
            SceneObject::directional_light(DirectionalLight::default()),
            SceneObject::ambient_light(AmbientLight::new(Color::WHITE, 0.1)),
        ]
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn ambient_light_scales_the_albedo() {
    use deferred_ngin::{
        ScenePass,
        data_structures::color::Color,
        scene::{AmbientLight, SceneObject},
    };

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(32, 32);
    let albedo = Color::new(0.8, 0.4, 0.2);
    let (scene, mut camera) = fixtures::framed_plane(&ctx, albedo);
    let light = AmbientLight::new(Color::new(1.0, 1.0, 0.5), 0.5);
    scene.add(&SceneObject::ambient_light(light)).unwrap();

    let mut pass = ScenePass::new(&ctx).unwrap();
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    let pixels = read_pixels(&mut ctx, pass.output());

    assert_eq!(pixels.dimensions(), (32, 32));
    assert_pixel_near(*pixels.get_pixel(16, 16), [0.4, 0.2, 0.05], 2.0 / 255.0);
    // the plane covers the whole frame
    assert_pixel_near(*pixels.get_pixel(1, 30), [0.4, 0.2, 0.05], 2.0 / 255.0);
}

#[test]
#[cfg(feature = "integration-tests")]
fn point_lights_fall_off_with_distance_and_decay() {
    use cgmath::{Matrix4, Vector3};
    use deferred_ngin::{
        ScenePass,
        data_structures::color::Color,
        scene::{PointLight, SceneObject},
    };

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(32, 32);
    let mut pass = ScenePass::new(&ctx).unwrap();
    let mut brightness = |distance: f32, decay: f32| {
        let (scene, mut camera) = fixtures::framed_plane(&ctx, Color::new(0.5, 0.5, 0.5));
        let light = SceneObject::point_light(PointLight::new(Color::WHITE, 1.0, decay));
        light.set_matrix(Matrix4::from_translation(Vector3::new(0.0, 0.0, distance)));
        scene.add(&light).unwrap();
        pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
        *read_pixels(&mut ctx, pass.output()).get_pixel(16, 16)
    };

    let near = brightness(1.0, 2.0);
    let far = brightness(2.0, 2.0);
    let undecayed = brightness(2.0, 0.0);

    // albedo * intensity / distance^decay, facing the light head on
    assert_pixel_near(near, [0.5, 0.5, 0.5], 3.0 / 255.0);
    assert_pixel_near(far, [0.125, 0.125, 0.125], 3.0 / 255.0);
    assert_pixel_near(undecayed, [0.5, 0.5, 0.5], 3.0 / 255.0);
    assert!(near[0] > far[0]);
}

#[test]
#[cfg(feature = "integration-tests")]
fn a_scene_without_lights_renders_black() {
    use deferred_ngin::{ScenePass, data_structures::color::Color};

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(16, 16);
    let (scene, mut camera) = fixtures::framed_plane(&ctx, Color::WHITE);

    let mut pass = ScenePass::new(&ctx).unwrap();
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    let pixels = read_pixels(&mut ctx, pass.output());

    assert_pixel_near(*pixels.get_pixel(8, 8), [0.0, 0.0, 0.0], 1.0 / 255.0);
}

#[test]
#[cfg(feature = "integration-tests")]
fn gbuffer_holds_albedo() {
    use deferred_ngin::{ScenePass, data_structures::color::Color};

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(16, 16);
    let (scene, mut camera) = fixtures::framed_plane(&ctx, Color::new(0.2, 0.6, 1.0));

    let mut pass = ScenePass::new(&ctx).unwrap();
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    let albedo = read_pixels(&mut ctx, pass.color_texture());

    assert_pixel_near(*albedo.get_pixel(8, 8), [0.2, 0.6, 1.0], 1.0 / 255.0);
}

#[test]
#[cfg(feature = "integration-tests")]
fn occluders_darken_the_floor_only_with_shadows_enabled() {
    use deferred_ngin::ScenePass;

    use crate::common::test_utils::{headless_context, read_pixels};

    let mut ctx = headless_context(64, 64);
    let mut pass = ScenePass::new(&ctx).unwrap();
    // x = -1 on the floor: in the box's shadow, not covered by the box itself
    let sample = (16, 32);

    let (lit_scene, mut camera) = fixtures::floor_with_occluder(&ctx, false);
    pass.render(&mut ctx, &lit_scene, &mut camera, None).unwrap();
    let unshadowed = *read_pixels(&mut ctx, pass.output()).get_pixel(sample.0, sample.1);

    let (shadowed_scene, mut camera) = fixtures::floor_with_occluder(&ctx, true);
    pass.render(&mut ctx, &shadowed_scene, &mut camera, None).unwrap();
    let shadowed_image = read_pixels(&mut ctx, pass.output());
    let shadowed = *shadowed_image.get_pixel(sample.0, sample.1);

    // N.L of the floor is cos(45 deg)
    assert!(unshadowed.0[0] > 150, "unshadowed floor is {:?}", unshadowed);
    assert!(
        (shadowed.0[0] as i32) < unshadowed.0[0] as i32 - 100,
        "shadowed floor {:?} is not darker than {:?}",
        shadowed,
        unshadowed
    );
    // the far side of the floor stays lit
    let lit = *shadowed_image.get_pixel(56, 32);
    assert!(lit.0[0] > 150, "lit floor is {:?}", lit);
}

#[test]
#[cfg(feature = "integration-tests")]
fn target_rects_leave_the_rest_of_the_gbuffer_alone() {
    use deferred_ngin::{
        ScenePass,
        data_structures::{bound::Bound2, color::Color},
    };

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(16, 16);
    let mut pass = ScenePass::new(&ctx).unwrap();
    let (white, mut camera) = fixtures::framed_plane(&ctx, Color::WHITE);
    pass.render(&mut ctx, &white, &mut camera, None).unwrap();

    let (blue, mut camera) = fixtures::framed_plane(&ctx, Color::new(0.0, 0.0, 1.0));
    pass.render(&mut ctx, &blue, &mut camera, Some(Bound2::new(0.0, 0.0, 0.5, 1.0)))
        .unwrap();
    let albedo = read_pixels(&mut ctx, pass.color_texture());

    assert_pixel_near(*albedo.get_pixel(3, 8), [0.0, 0.0, 1.0], 1.0 / 255.0);
    assert_pixel_near(*albedo.get_pixel(12, 8), [1.0, 1.0, 1.0], 1.0 / 255.0);
}

#[test]
#[cfg(feature = "integration-tests")]
fn stages_run_in_order() {
    use deferred_ngin::{PassStage, ScenePass, data_structures::color::Color};

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(16, 16);
    let (scene, mut camera) = fixtures::framed_plane(&ctx, Color::WHITE);
    for light in fixtures::all_lights() {
        scene.add(&light).unwrap();
    }

    let mut pass = ScenePass::new(&ctx).unwrap();
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();

    assert_eq!(
        pass.last_stages(),
        &[
            PassStage::Resize,
            PassStage::SceneUpdate,
            PassStage::Geometry,
            PassStage::Accumulation,
            PassStage::Ambient,
            PassStage::Shadow,
            PassStage::Directional,
            PassStage::Point,
            PassStage::Composite,
        ]
    );
    assert_eq!(pass.buckets().meshes.len(), 1);
    assert_eq!(pass.buckets().ambient_lights.len(), 1);
}

#[test]
#[cfg(feature = "integration-tests")]
fn targets_follow_the_viewport() {
    use deferred_ngin::{
        RenderPass, ScenePass,
        data_structures::{bound::Viewport, color::Color, texture::Resizable},
    };

    use crate::common::test_utils::headless_context;

    let mut ctx = headless_context(40, 20);
    let (scene, mut camera) = fixtures::framed_plane(&ctx, Color::WHITE);
    let mut pass = ScenePass::new(&ctx).unwrap();

    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    assert_eq!(pass.output().size(), (40, 20));
    assert_eq!(pass.color_texture().size(), (40, 20));
    assert_eq!(pass.shadow_map().size(), (1024, 1024));

    ctx.set_pixel_ratio(2.0);
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    assert_eq!(pass.depth_texture().size(), (80, 40));

    pass.set_size(10, 10);
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    assert_eq!(pass.accumulation_texture().size(), (10, 10));

    pass.set_viewport(Some(Viewport::new(4, 2, 10, 10)));
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    assert_eq!(pass.output().size(), (6, 8));
}

#[test]
#[cfg(feature = "integration-tests")]
fn debug_mode_tiles_the_gbuffer() {
    use deferred_ngin::{
        ScenePass,
        data_structures::color::Color,
        scene::{AmbientLight, SceneObject},
    };

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(32, 32);
    let albedo = Color::new(0.0, 1.0, 0.0);
    let (scene, mut camera) = fixtures::framed_plane(&ctx, albedo);
    scene
        .add(&SceneObject::ambient_light(AmbientLight::new(Color::WHITE, 0.5)))
        .unwrap();

    let mut pass = ScenePass::new(&ctx).unwrap();
    pass.debug = true;
    pass.render(&mut ctx, &scene, &mut camera, None).unwrap();
    let pixels = read_pixels(&mut ctx, pass.output());

    // top-left quadrant shows albedo, bottom-right the accumulated light
    assert_pixel_near(*pixels.get_pixel(8, 8), [0.0, 1.0, 0.0], 2.0 / 255.0);
    assert_pixel_near(*pixels.get_pixel(24, 24), [0.0, 0.5, 0.0], 2.0 / 255.0);
}

#[test]
#[cfg(feature = "integration-tests")]
fn copy_effect_preserves_orientation() {
    use deferred_ngin::{CopyEffect, EffectPass, data_structures::texture::Texture};

    use crate::common::test_utils::{assert_pixel_near, headless_context, read_pixels};

    let mut ctx = headless_context(8, 8);
    let image = image::RgbaImage::from_fn(8, 8, |_, y| {
        if y < 4 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 255])
        }
    });
    let input = Texture::from_image(image);
    input.update_params(|params| {
        params.generate_mipmaps = false;
        params.min_filter = deferred_ngin::data_structures::texture::Filter::Nearest;
        params.mag_filter = deferred_ngin::data_structures::texture::Filter::Nearest;
    });

    let mut pass = EffectPass::new(&ctx, CopyEffect::new(Some(input))).unwrap();
    pass.render(&mut ctx).unwrap();
    let pixels = read_pixels(&mut ctx, pass.output());

    assert_pixel_near(*pixels.get_pixel(4, 1), [1.0, 0.0, 0.0], 1.0 / 255.0);
    assert_pixel_near(*pixels.get_pixel(4, 6), [0.0, 0.0, 1.0], 1.0 / 255.0);
    assert!(matches!(
        pass.present(&mut ctx),
        Err(deferred_ngin::Error::Configuration(_))
    ));
}
