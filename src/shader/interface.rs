//! Compilation, linking and reflection of a vertex/fragment stage pair.
//!
//! The stages are WGSL with entry points `vs_main` and `fs_main`. Parsing a
//! stage is the compile step. Validating both modules and matching the vertex
//! outputs against the fragment inputs is the link step. Reflection then walks
//! the resources the entry points actually use:
//!
//! - members of `var<uniform>` structs become uniforms named after the member
//! - `texture_2d<f32>` and `texture_depth_2d` globals become `Sampler2D`
//!   uniforms, optionally paired with a sampler global named `<texture>_sampler`
//! - `@location` inputs of `vs_main` become attributes
//!
//! WGSL has no host-shareable `bool`, so `u32` members reflect as `Bool`.

use std::collections::{BTreeMap, HashMap};

use naga::{
    AddressSpace, Binding, ImageClass, ImageDimension, Module, ScalarKind, ShaderStage, TypeInner,
    VectorSize,
    valid::{Capabilities, ModuleInfo, ValidationFlags, Validator},
};

use crate::{
    error::{Error, Result},
    shader::{
        attribute::{AttributeKind, ShaderAttribute},
        uniform::{ShaderUniform, UniformKind, UniformSlot, UniformValue},
    },
};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Target limits that reflection checks against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShaderLimits {
    pub max_texture_units: u32,
}

impl ShaderLimits {
    pub fn from_device(device: &wgpu::Device) -> Self {
        Self {
            max_texture_units: device.limits().max_sampled_textures_per_shader_stage,
        }
    }
}

impl Default for ShaderLimits {
    fn default() -> Self {
        Self {
            max_texture_units: 8,
        }
    }
}

/// A uniform buffer binding and its CPU-side image.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BlockLayout {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: Vec<(String, UniformKind, u32)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SampleKind {
    Float,
    Depth,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SamplerKind {
    Filtering,
    NonFiltering,
    Comparison,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TextureSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub sample: SampleKind,
    pub sampler: Option<(u32, SamplerKind)>,
}

/// One entry of a bind group, in binding order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum GroupEntry {
    Block(usize),
    Texture(usize),
    Sampler(usize),
}

/// The reflected interface of a linked program.
#[derive(Clone, Debug)]
pub struct ShaderInterface {
    pub(crate) blocks: Vec<BlockLayout>,
    pub(crate) textures: Vec<TextureSlot>,
    pub(crate) groups: Vec<Vec<(u32, GroupEntry)>>,
    pub(crate) staging: Vec<Vec<u8>>,
    uniforms: BTreeMap<String, ShaderUniform>,
    attributes: BTreeMap<String, ShaderAttribute>,
}

/// Raw resource found in one stage, before both stages are merged.
#[derive(Clone, Debug, PartialEq)]
enum Resource {
    Block(BlockLayout),
    Texture { name: String, sample: SampleKind },
    Sampler { name: String, comparison: bool },
}

impl ShaderInterface {
    /// Compiles, links and reflects a stage pair.
    pub fn reflect(vertex: &str, fragment: &str, limits: &ShaderLimits) -> Result<Self> {
        let vs = compile("vertex", vertex)?;
        let fs = compile("fragment", fragment)?;
        let vs_info = validate("vertex", &vs, vertex)?;
        let fs_info = validate("fragment", &fs, fragment)?;
        let vs_entry = entry_point(&vs, ShaderStage::Vertex, VERTEX_ENTRY)?;
        let fs_entry = entry_point(&fs, ShaderStage::Fragment, FRAGMENT_ENTRY)?;
        check_stage_interface(&vs, vs_entry, &fs, fs_entry)?;

        let mut resources: BTreeMap<(u32, u32), Resource> = BTreeMap::new();
        for (module, info, entry) in [(&vs, &vs_info, vs_entry), (&fs, &fs_info, fs_entry)] {
            for (group_binding, resource) in stage_resources(module, info, entry)? {
                match resources.get(&group_binding) {
                    Some(existing) if *existing != resource => {
                        return Err(Error::Link {
                            log: format!(
                                "@group({}) @binding({}) is declared differently by the two stages",
                                group_binding.0, group_binding.1
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        resources.insert(group_binding, resource);
                    }
                }
            }
        }

        let mut interface = Self {
            blocks: Vec::new(),
            textures: Vec::new(),
            groups: Vec::new(),
            staging: Vec::new(),
            uniforms: BTreeMap::new(),
            attributes: BTreeMap::new(),
        };
        interface.collect_resources(resources, limits)?;
        interface.collect_attributes(&vs, vs_entry)?;
        Ok(interface)
    }

    fn collect_resources(
        &mut self,
        resources: BTreeMap<(u32, u32), Resource>,
        limits: &ShaderLimits,
    ) -> Result<()> {
        let samplers: HashMap<(u32, String), (u32, bool)> = resources
            .iter()
            .filter_map(|((group, binding), r)| match r {
                Resource::Sampler { name, comparison } => {
                    Some(((*group, name.clone()), (*binding, *comparison)))
                }
                _ => None,
            })
            .collect();
        let mut paired = Vec::new();

        for ((group, binding), resource) in &resources {
            let entry = match resource {
                Resource::Block(layout) => {
                    let block = self.blocks.len();
                    for (name, kind, offset) in &layout.members {
                        self.add_uniform(ShaderUniform::new(
                            name.clone(),
                            *kind,
                            UniformSlot::Block {
                                block,
                                offset: *offset,
                            },
                            None,
                        ))?;
                    }
                    self.staging.push(vec![0; layout.size as usize]);
                    self.blocks.push(layout.clone());
                    GroupEntry::Block(block)
                }
                Resource::Texture { name, sample } => {
                    let slot = self.textures.len();
                    let unit = slot as u32;
                    if unit >= limits.max_texture_units {
                        return Err(Error::UnsupportedTextureUnits {
                            name: name.clone(),
                            unit,
                            max: limits.max_texture_units,
                        });
                    }
                    let sampler_name = format!("{}_sampler", name);
                    let sampler = samplers.get(&(*group, sampler_name.clone())).map(
                        |(binding, comparison)| {
                            paired.push((*group, sampler_name.clone()));
                            let kind = match (comparison, sample) {
                                (true, _) => SamplerKind::Comparison,
                                (false, SampleKind::Depth) => SamplerKind::NonFiltering,
                                (false, SampleKind::Float) => SamplerKind::Filtering,
                            };
                            (*binding, kind)
                        },
                    );
                    self.textures.push(TextureSlot {
                        name: name.clone(),
                        group: *group,
                        binding: *binding,
                        sample: *sample,
                        sampler,
                    });
                    self.add_uniform(ShaderUniform::new(
                        name.clone(),
                        UniformKind::Sampler2D,
                        UniformSlot::Texture { slot },
                        Some(unit),
                    ))?;
                    GroupEntry::Texture(slot)
                }
                Resource::Sampler { .. } => continue,
            };
            self.push_group_entry(*group, *binding, entry);
        }

        for ((group, binding), resource) in &resources {
            if let Resource::Sampler { name, .. } = resource {
                if !paired.contains(&(*group, name.clone())) {
                    return Err(Error::UnsupportedType {
                        name: name.clone(),
                        ty: "sampler without a texture named by its `_sampler` prefix".to_string(),
                    });
                }
                let slot = self
                    .textures
                    .iter()
                    .position(|t| t.group == *group && format!("{}_sampler", t.name) == *name)
                    .unwrap_or_default();
                self.push_group_entry(*group, *binding, GroupEntry::Sampler(slot));
            }
        }
        for entries in &mut self.groups {
            entries.sort_by_key(|(binding, _)| *binding);
        }
        Ok(())
    }

    fn push_group_entry(&mut self, group: u32, binding: u32, entry: GroupEntry) {
        let group = group as usize;
        if self.groups.len() <= group {
            self.groups.resize(group + 1, Vec::new());
        }
        self.groups[group].push((binding, entry));
    }

    fn add_uniform(&mut self, uniform: ShaderUniform) -> Result<()> {
        if self.uniforms.contains_key(uniform.name()) {
            return Err(Error::Link {
                log: format!("uniform \"{}\" is declared more than once", uniform.name()),
            });
        }
        self.uniforms.insert(uniform.name().to_string(), uniform);
        Ok(())
    }

    fn collect_attributes(&mut self, module: &Module, entry: usize) -> Result<()> {
        let mut inputs = Vec::new();
        let function = &module.entry_points[entry].function;
        for argument in &function.arguments {
            let name = argument.name.clone().unwrap_or_default();
            match (&argument.binding, &module.types[argument.ty].inner) {
                (Some(Binding::Location { location, .. }), inner) => {
                    inputs.push((*location, name, inner.clone()));
                }
                (None, TypeInner::Struct { members, .. }) => {
                    for member in members {
                        if let Some(Binding::Location { location, .. }) = &member.binding {
                            inputs.push((
                                *location,
                                member.name.clone().unwrap_or_default(),
                                module.types[member.ty].inner.clone(),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }
        inputs.sort_by_key(|(location, _, _)| *location);

        for (slot, (location, name, inner)) in inputs.into_iter().enumerate() {
            let kind = match inner {
                TypeInner::Scalar(s) if s.kind == ScalarKind::Float && s.width == 4 => {
                    AttributeKind::Float
                }
                TypeInner::Vector { size, scalar }
                    if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
                {
                    match size {
                        VectorSize::Bi => AttributeKind::Vec2,
                        VectorSize::Tri => AttributeKind::Vec3,
                        VectorSize::Quad => AttributeKind::Vec4,
                    }
                }
                other => {
                    return Err(Error::UnsupportedType {
                        name,
                        ty: format!("{:?}", other),
                    });
                }
            };
            self.attributes.insert(
                name.clone(),
                ShaderAttribute::new(name, kind, location, slot as u32),
            );
        }
        Ok(())
    }

    /// Looks up an active uniform. A missing name is a configuration error.
    pub fn uniform(&mut self, name: &str) -> Result<&mut ShaderUniform> {
        self.uniforms
            .get_mut(name)
            .ok_or_else(|| Error::configuration(format!("no active uniform \"{}\"", name)))
    }

    pub fn try_uniform(&mut self, name: &str) -> Option<&mut ShaderUniform> {
        self.uniforms.get_mut(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &ShaderUniform> {
        self.uniforms.values()
    }

    /// Looks up an active attribute. A missing name is a configuration error.
    pub fn attribute(&mut self, name: &str) -> Result<&mut ShaderAttribute> {
        self.attributes
            .get_mut(name)
            .ok_or_else(|| Error::configuration(format!("no active attribute \"{}\"", name)))
    }

    pub fn try_attribute(&mut self, name: &str) -> Option<&mut ShaderAttribute> {
        self.attributes.get_mut(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &ShaderAttribute> {
        self.attributes.values()
    }

    /// Vertex buffer layouts in slot order, one buffer per attribute.
    pub(crate) fn vertex_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        let mut attributes: Vec<&ShaderAttribute> = self.attributes.values().collect();
        attributes.sort_by_key(|a| a.slot);
        attributes
            .into_iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.kind().vertex_format(),
                offset: 0,
                shader_location: a.location(),
            })
            .collect()
    }

    /// Moves every pending uniform value into the block images or texture slots.
    ///
    /// Blocks that received a value are flagged in `changed`. Returns the
    /// textures staged per texture slot since the last call.
    pub(crate) fn apply_pending(&mut self, changed: &mut [bool]) -> Vec<(usize, UniformValue)> {
        let mut staged_textures = Vec::new();
        for uniform in self.uniforms.values_mut() {
            let Some(value) = uniform.take_pending() else {
                continue;
            };
            match uniform.slot {
                UniformSlot::Block { block, offset } => {
                    value.write_std140(&mut self.staging[block][offset as usize..]);
                    changed[block] = true;
                }
                UniformSlot::Texture { slot } => staged_textures.push((slot, value)),
            }
        }
        staged_textures
    }

    pub(crate) fn sorted_attributes(&self) -> Vec<&ShaderAttribute> {
        let mut attributes: Vec<&ShaderAttribute> = self.attributes.values().collect();
        attributes.sort_by_key(|a| a.slot);
        attributes
    }
}

fn compile(stage: &'static str, source: &str) -> Result<Module> {
    naga::front::wgsl::parse_str(source).map_err(|e| Error::Compile {
        stage,
        log: e.emit_to_string(source),
        shader_source: source.to_string(),
    })
}

fn validate(stage: &'static str, module: &Module, source: &str) -> Result<ModuleInfo> {
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(module)
        .map_err(|e| Error::Link {
            log: format!("{} stage: {}", stage, e.emit_to_string(source)),
        })
}

fn entry_point(module: &Module, stage: ShaderStage, name: &str) -> Result<usize> {
    module
        .entry_points
        .iter()
        .position(|e| e.stage == stage && e.name == name)
        .ok_or_else(|| Error::Link {
            log: format!("missing entry point `{}`", name),
        })
}

/// User-defined varyings of an entry point: outputs for vertex, inputs for fragment.
fn varyings(module: &Module, entry: usize, outputs: bool) -> BTreeMap<u32, TypeInner> {
    let function = &module.entry_points[entry].function;
    let mut found = BTreeMap::new();
    let mut visit = |binding: &Option<Binding>, ty: naga::Handle<naga::Type>| {
        let inner = &module.types[ty].inner;
        match (binding, inner) {
            (Some(Binding::Location { location, .. }), inner) => {
                found.insert(*location, inner.clone());
            }
            (None, TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(Binding::Location { location, .. }) = &member.binding {
                        found.insert(*location, module.types[member.ty].inner.clone());
                    }
                }
            }
            _ => {}
        }
    };
    if outputs {
        if let Some(result) = &function.result {
            visit(&result.binding, result.ty);
        }
    } else {
        for argument in &function.arguments {
            visit(&argument.binding, argument.ty);
        }
    }
    found
}

fn check_stage_interface(vs: &Module, vs_entry: usize, fs: &Module, fs_entry: usize) -> Result<()> {
    let outputs = varyings(vs, vs_entry, true);
    for (location, input) in varyings(fs, fs_entry, false) {
        match outputs.get(&location) {
            Some(output) if *output == input => {}
            Some(output) => {
                return Err(Error::Link {
                    log: format!(
                        "varying at location {} is {:?} in the vertex stage but {:?} in the fragment stage",
                        location, output, input
                    ),
                });
            }
            None => {
                return Err(Error::Link {
                    log: format!(
                        "fragment input at location {} is not written by the vertex stage",
                        location
                    ),
                });
            }
        }
    }
    Ok(())
}

fn uniform_kind(name: &str, inner: &TypeInner) -> Result<UniformKind> {
    let unsupported = || Error::UnsupportedType {
        name: name.to_string(),
        ty: format!("{:?}", inner),
    };
    let kind = match inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Uint => UniformKind::Bool,
            ScalarKind::Sint => UniformKind::Int,
            ScalarKind::Float => UniformKind::Float,
            _ => return Err(unsupported()),
        },
        TypeInner::Vector { size, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
        {
            match size {
                VectorSize::Bi => UniformKind::Vec2,
                VectorSize::Tri => UniformKind::Vec3,
                VectorSize::Quad => UniformKind::Vec4,
            }
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if scalar.kind == ScalarKind::Float && scalar.width == 4 => match (columns, rows) {
            (VectorSize::Tri, VectorSize::Tri) => UniformKind::Mat3,
            (VectorSize::Quad, VectorSize::Quad) => UniformKind::Mat4,
            _ => return Err(unsupported()),
        },
        _ => return Err(unsupported()),
    };
    Ok(kind)
}

/// Resources used by one entry point, keyed by group and binding.
fn stage_resources(
    module: &Module,
    info: &ModuleInfo,
    entry: usize,
) -> Result<Vec<((u32, u32), Resource)>> {
    let usage = info.get_entry_point(entry);
    let mut resources = Vec::new();
    for (handle, global) in module.global_variables.iter() {
        if usage[handle].is_empty() {
            continue;
        }
        let name = global.name.clone().unwrap_or_default();
        let Some(binding) = &global.binding else {
            continue;
        };
        let key = (binding.group, binding.binding);
        let inner = &module.types[global.ty].inner;
        let resource = match (global.space, inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                let mut layout = BlockLayout {
                    group: binding.group,
                    binding: binding.binding,
                    size: *span,
                    members: Vec::new(),
                };
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    let kind = uniform_kind(&member_name, &module.types[member.ty].inner)?;
                    layout.members.push((member_name, kind, member.offset));
                }
                Resource::Block(layout)
            }
            (AddressSpace::Uniform, other) => {
                let kind = uniform_kind(&name, other)?;
                let size = other.size(module.to_ctx()).max(16);
                Resource::Block(BlockLayout {
                    group: binding.group,
                    binding: binding.binding,
                    size,
                    members: vec![(name, kind, 0)],
                })
            }
            (
                AddressSpace::Handle,
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class,
                },
            ) => match class {
                ImageClass::Sampled {
                    kind: ScalarKind::Float,
                    multi: false,
                } => Resource::Texture {
                    name,
                    sample: SampleKind::Float,
                },
                ImageClass::Depth { multi: false } => Resource::Texture {
                    name,
                    sample: SampleKind::Depth,
                },
                _ => {
                    return Err(Error::UnsupportedType {
                        name,
                        ty: format!("{:?}", inner),
                    });
                }
            },
            (AddressSpace::Handle, TypeInner::Sampler { comparison }) => Resource::Sampler {
                name,
                comparison: *comparison,
            },
            _ => {
                return Err(Error::UnsupportedType {
                    name,
                    ty: format!("{:?} in {:?}", inner, global.space),
                });
            }
        };
        resources.push((key, resource));
    }
    Ok(resources)
}
