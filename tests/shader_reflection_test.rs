use deferred_ngin::{
    Error,
    data_structures::geometry::GeometryBuffer,
    shader::{AttributeKind, ShaderInterface, ShaderLimits, UniformKind},
};

const VARYINGS: &str = "
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};
";

const VERTEX: &str = "
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

struct Transforms {
    model_matrix: mat4x4<f32>,
    normal_matrix: mat3x3<f32>,
};
@group(0) @binding(0)
var<uniform> transforms: Transforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) weight: f32,
};

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.uv = model.uv * model.weight;
    let offset = transforms.normal_matrix * vec3<f32>(0.0, 0.0, 1.0);
    out.clip_position = transforms.model_matrix * vec4<f32>(model.position + offset, 1.0);
    return out;
}
";

fn fragment(body: &str) -> String {
    format!("{}\n{}", VARYINGS, body)
}

const MATERIAL_FRAGMENT: &str = "
struct Material {
    tint: vec4<f32>,
    strength: f32,
    enabled: u32,
    mode: i32,
    offset: vec2<f32>,
};
@group(1) @binding(0)
var<uniform> material: Material;

@group(1) @binding(1)
var<uniform> time: f32;

@group(2) @binding(0)
var albedo: texture_2d<f32>;
@group(2) @binding(1)
var albedo_sampler: sampler;
@group(2) @binding(2)
var depth_map: texture_depth_2d;

@group(3) @binding(0)
var<uniform> never_read: vec4<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(albedo, albedo_sampler, in.uv);
    let depth = textureLoad(depth_map, vec2<i32>(0, 0), 0);
    var result = color * material.tint * material.strength
        + vec4<f32>(material.offset, depth, time);
    if material.enabled == 0u {
        result = vec4<f32>(0.0);
    }
    if material.mode > 1 {
        result = result * 0.5;
    }
    return result;
}
";

fn reflect(fragment_body: &str) -> deferred_ngin::Result<ShaderInterface> {
    ShaderInterface::reflect(VERTEX, &fragment(fragment_body), &ShaderLimits::default())
}

#[test]
fn uniform_kinds_are_reflected_from_both_stages() {
    let mut interface = reflect(MATERIAL_FRAGMENT).unwrap();

    let expected = [
        ("model_matrix", UniformKind::Mat4),
        ("normal_matrix", UniformKind::Mat3),
        ("tint", UniformKind::Vec4),
        ("strength", UniformKind::Float),
        ("enabled", UniformKind::Bool),
        ("mode", UniformKind::Int),
        ("offset", UniformKind::Vec2),
        ("time", UniformKind::Float),
        ("albedo", UniformKind::Sampler2D),
        ("depth_map", UniformKind::Sampler2D),
    ];
    for (name, kind) in expected {
        assert_eq!(interface.uniform(name).unwrap().kind(), kind, "{}", name);
    }
    assert_eq!(interface.uniforms().count(), expected.len());
}

#[test]
fn unused_globals_are_not_active() {
    let mut interface = reflect(MATERIAL_FRAGMENT).unwrap();

    assert!(interface.try_uniform("never_read").is_none());
    assert!(matches!(
        interface.uniform("never_read"),
        Err(Error::Configuration(_))
    ));
    // samplers are bound with their texture, not exposed as uniforms
    assert!(interface.try_uniform("albedo_sampler").is_none());
}

#[test]
fn texture_units_follow_binding_order() {
    let mut interface = reflect(MATERIAL_FRAGMENT).unwrap();

    assert_eq!(interface.uniform("albedo").unwrap().texture_unit(), Some(0));
    assert_eq!(interface.uniform("depth_map").unwrap().texture_unit(), Some(1));
    assert_eq!(interface.uniform("tint").unwrap().texture_unit(), None);
}

#[test]
fn setters_stage_values_of_the_matching_kind_only() {
    let mut interface = reflect(MATERIAL_FRAGMENT).unwrap();

    let strength = interface.uniform("strength").unwrap();
    assert!(!strength.has_pending());
    assert!(matches!(
        strength.set_vec3([1.0, 2.0, 3.0]),
        Err(Error::UnsupportedValue { .. })
    ));
    assert!(!strength.has_pending());
    strength.set_float(0.5).unwrap();
    assert!(strength.has_pending());

    let enabled = interface.uniform("enabled").unwrap();
    assert!(matches!(enabled.set_int(1), Err(Error::UnsupportedValue { .. })));
    enabled.set_bool(true).unwrap();

    let albedo = interface.uniform("albedo").unwrap();
    assert!(matches!(albedo.set_float(1.0), Err(Error::UnsupportedValue { .. })));
    albedo.set_sampler_2d(None).unwrap();

    interface
        .uniform("model_matrix")
        .unwrap()
        .set_mat4(cgmath::Matrix4::from_scale(2.0))
        .unwrap();
    interface
        .uniform("normal_matrix")
        .unwrap()
        .set_mat3(cgmath::Matrix3::from_angle_z(cgmath::Deg(90.0)))
        .unwrap();
}

#[test]
fn attributes_are_reflected_with_locations() {
    let mut interface = reflect(MATERIAL_FRAGMENT).unwrap();

    let expected = [
        ("position", AttributeKind::Vec3, 0),
        ("uv", AttributeKind::Vec2, 1),
        ("weight", AttributeKind::Float, 2),
    ];
    for (name, kind, location) in expected {
        let attribute = interface.attribute(name).unwrap();
        assert_eq!(attribute.kind(), kind, "{}", name);
        assert_eq!(attribute.location(), location, "{}", name);
    }
    assert_eq!(interface.attributes().count(), 3);
    assert!(matches!(
        interface.attribute("color"),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn attribute_setters_check_kind_and_buffer_width() {
    let mut interface = reflect(MATERIAL_FRAGMENT).unwrap();
    let positions = GeometryBuffer::new(vec![0.0; 9], 3).unwrap();
    let uvs = GeometryBuffer::new(vec![0.0; 6], 2).unwrap();

    let position = interface.attribute("position").unwrap();
    assert!(matches!(
        position.set_vec2(Some(&uvs)),
        Err(Error::UnsupportedValue { .. })
    ));
    assert!(matches!(
        position.set_vec3(Some(&uvs)),
        Err(Error::UnsupportedValue { .. })
    ));
    assert!(position.buffer().is_none());

    position.set_vec3(Some(&positions)).unwrap();
    assert_eq!(position.buffer().map(|b| b.id()), Some(positions.id()));

    position.set_buffer(None).unwrap();
    assert!(position.buffer().is_none());
}

#[test]
fn non_square_matrix_uniforms_are_unsupported() {
    let result = reflect(
        "
struct Block {
    rotation: mat2x2<f32>,
};
@group(1) @binding(0)
var<uniform> block: Block;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(block.rotation * in.uv, 0.0, 1.0);
}
",
    );
    match result {
        Err(Error::UnsupportedType { name, .. }) => assert_eq!(name, "rotation"),
        other => panic!("expected an unsupported type, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn integer_textures_are_unsupported() {
    let result = reflect(
        "
@group(1) @binding(0)
var ids: texture_2d<u32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let id = textureLoad(ids, vec2<i32>(0, 0), 0);
    return vec4<f32>(f32(id.x));
}
",
    );
    assert!(matches!(result, Err(Error::UnsupportedType { .. })));
}

#[test]
fn samplers_need_a_matching_texture() {
    let result = reflect(
        "
@group(1) @binding(0)
var albedo: texture_2d<f32>;
@group(1) @binding(1)
var lonely: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(albedo, lonely, in.uv);
}
",
    );
    match result {
        Err(Error::UnsupportedType { name, .. }) => assert_eq!(name, "lonely"),
        other => panic!("expected an unsupported type, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn texture_units_beyond_the_limit_are_rejected() {
    let mut body = String::new();
    for i in 0..9 {
        body.push_str(&format!(
            "@group(1) @binding({i})\nvar t{i}: texture_2d<f32>;\n"
        ));
    }
    body.push_str("@fragment\nfn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {\n");
    body.push_str("    var sum = vec4<f32>(0.0);\n");
    for i in 0..9 {
        body.push_str(&format!("    sum = sum + textureLoad(t{i}, vec2<i32>(0, 0), 0);\n"));
    }
    body.push_str("    return sum;\n}\n");

    match reflect(&body) {
        Err(Error::UnsupportedTextureUnits { name, unit, max }) => {
            assert_eq!(name, "t8");
            assert_eq!(unit, 8);
            assert_eq!(max, 8);
        }
        other => panic!("expected a texture unit error, got {:?}", other.map(|_| ())),
    }

    let roomy = ShaderLimits {
        max_texture_units: 16,
    };
    assert!(ShaderInterface::reflect(VERTEX, &fragment(&body), &roomy).is_ok());
}

#[test]
fn syntax_errors_fail_compilation() {
    let result = reflect("@fragment\nfn fs_main(in: VertexOutput -> @location(0) vec4<f32> {");
    match result {
        Err(Error::Compile { stage, shader_source, .. }) => {
            assert_eq!(stage, "fragment");
            assert!(shader_source.contains("fs_main"));
        }
        other => panic!("expected a compile error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn mismatched_varyings_fail_linking() {
    let result = ShaderInterface::reflect(
        VERTEX,
        "
@fragment
fn fs_main(@location(0) uv: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 1.0);
}
",
        &ShaderLimits::default(),
    );
    assert!(matches!(result, Err(Error::Link { .. })));

    let unwritten = ShaderInterface::reflect(
        VERTEX,
        "
@fragment
fn fs_main(@location(3) extra: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(extra);
}
",
        &ShaderLimits::default(),
    );
    assert!(matches!(unwritten, Err(Error::Link { .. })));
}

#[test]
fn missing_entry_points_fail_linking() {
    let result = reflect(
        "
@fragment
fn main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.uv, 0.0, 1.0);
}
",
    );
    assert!(matches!(result, Err(Error::Link { .. })));
}

#[test]
fn stages_must_agree_on_shared_bindings() {
    let result = reflect(
        "
@group(0) @binding(0)
var<uniform> other: vec4<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return other;
}
",
    );
    assert!(matches!(result, Err(Error::Link { .. })));
}
