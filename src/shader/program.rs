//! Linked programs: reflected bindings, pipelines and per-draw resources.

use std::collections::HashMap;

use crate::{
    data_structures::{ResourceId, texture::Texture},
    error::{Error, Result},
    pipelines::{PipelineModules, RasterState, mk_render_pipeline},
    shader::{
        attribute::ShaderAttribute,
        interface::{GroupEntry, SampleKind, SamplerKind, ShaderInterface, ShaderLimits},
        library::ShaderLibrary,
        uniform::{ShaderUniform, UniformValue},
    },
    state::{GpuTexture, RenderingState, TargetLayout},
};

/// Per-frame storage for one uniform block.
///
/// Each `update` that changed the block takes a fresh slot, so draws recorded
/// earlier in the same frame keep the values they were recorded with. The
/// cursor rewinds when the rendering state starts a new frame.
struct UniformRing {
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: u64,
    cursor: u64,
    frame: u64,
    /// Offset of the slot holding the current block image, if still valid.
    current: Option<u32>,
    generation: u64,
}

impl UniformRing {
    const INITIAL_SLOTS: u64 = 16;

    fn new(device: &wgpu::Device, size: u32, generation: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = (size as u64).div_ceil(alignment) * alignment;
        Self {
            buffer: create_ring_buffer(device, stride * Self::INITIAL_SLOTS),
            stride,
            capacity: Self::INITIAL_SLOTS,
            cursor: 0,
            frame: u64::MAX,
            current: None,
            generation,
        }
    }

    /// Returns the dynamic offset of a slot holding `bytes`.
    fn push(&mut self, state: &RenderingState, bytes: &[u8], changed: bool) -> u32 {
        if self.frame != state.frame() {
            self.frame = state.frame();
            self.cursor = 0;
            self.current = None;
        }
        if let (Some(offset), false) = (self.current, changed) {
            return offset;
        }
        if self.cursor == self.capacity {
            self.capacity *= 2;
            self.buffer = create_ring_buffer(state.device(), self.stride * self.capacity);
            self.generation += 1;
            self.cursor = 0;
            log::debug!(
                "grew uniform ring to {} slots of {} bytes",
                self.capacity,
                self.stride
            );
        }
        let offset = self.cursor * self.stride;
        state.queue().write_buffer(&self.buffer, offset, bytes);
        self.cursor += 1;
        self.current = Some(offset as u32);
        offset as u32
    }
}

fn create_ring_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform ring"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Everything a draw needs, resolved by [`ShaderProgram::update`].
struct PreparedDraw {
    bind_groups: Vec<(wgpu::BindGroup, Vec<u32>)>,
    vertex_buffers: Vec<wgpu::Buffer>,
}

/// A compiled and linked vertex/fragment program.
///
/// Uniform and attribute setters only stage values. [`ShaderProgram::update`]
/// resolves them against the [`RenderingState`] and must be called before
/// every [`ShaderProgram::draw`] whose inputs changed.
pub struct ShaderProgram {
    id: ResourceId,
    interface: ShaderInterface,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<(TargetLayout, RasterState), wgpu::RenderPipeline>,
    current: Option<wgpu::RenderPipeline>,
    rings: Vec<UniformRing>,
    block_changed: Vec<bool>,
    textures: Vec<Option<Texture>>,
    bind_groups: Vec<Option<(Vec<u64>, wgpu::BindGroup)>>,
    prepared: Option<PreparedDraw>,
}

impl ShaderProgram {
    /// Expands includes, then compiles, links and reflects both stages.
    pub fn new(
        state: &RenderingState,
        vertex_source: &str,
        fragment_source: &str,
        library: Option<&ShaderLibrary>,
    ) -> Result<Self> {
        let limits = ShaderLimits::from_device(state.device());
        Self::with_limits(state, vertex_source, fragment_source, library, &limits)
    }

    pub fn with_limits(
        state: &RenderingState,
        vertex_source: &str,
        fragment_source: &str,
        library: Option<&ShaderLibrary>,
        limits: &ShaderLimits,
    ) -> Result<Self> {
        let (vertex_source, fragment_source) = match library {
            Some(library) => (
                library.replace_includes(vertex_source)?,
                library.replace_includes(fragment_source)?,
            ),
            None => (vertex_source.to_string(), fragment_source.to_string()),
        };
        let interface = ShaderInterface::reflect(&vertex_source, &fragment_source, limits)?;
        let device = state.device();

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Stage"),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fragment Stage"),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let group_layouts: Vec<wgpu::BindGroupLayout> = interface
            .groups
            .iter()
            .map(|entries| {
                let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = entries
                    .iter()
                    .map(|(binding, entry)| layout_entry(&interface, *binding, *entry))
                    .collect();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("program_bind_group_layout"),
                    entries: &layout_entries,
                })
            })
            .collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &group_layouts.iter().map(Some).collect::<Vec<_>>(),
            immediate_size: 0,
        });

        let rings = interface
            .blocks
            .iter()
            .map(|block| UniformRing::new(device, block.size, 0))
            .collect();
        let block_changed = vec![true; interface.blocks.len()];
        let textures = vec![None; interface.textures.len()];
        let bind_groups = vec![None; group_layouts.len()];
        let program = Self {
            id: ResourceId::next(),
            interface,
            vertex,
            fragment,
            group_layouts,
            pipeline_layout,
            pipelines: HashMap::new(),
            current: None,
            rings,
            block_changed,
            textures,
            bind_groups,
            prepared: None,
        };
        log::debug!(
            "linked program {:?}: {} uniforms, {} attributes",
            program.id,
            program.interface.uniforms().count(),
            program.interface.attributes().count()
        );
        Ok(program)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn interface(&self) -> &ShaderInterface {
        &self.interface
    }

    pub fn uniform(&mut self, name: &str) -> Result<&mut ShaderUniform> {
        self.interface.uniform(name)
    }

    pub fn try_uniform(&mut self, name: &str) -> Option<&mut ShaderUniform> {
        self.interface.try_uniform(name)
    }

    pub fn attribute(&mut self, name: &str) -> Result<&mut ShaderAttribute> {
        self.interface.attribute(name)
    }

    pub fn try_attribute(&mut self, name: &str) -> Option<&mut ShaderAttribute> {
        self.interface.try_attribute(name)
    }

    /// Selects the pipeline for drawing into `target` with `raster` state.
    ///
    /// Does not apply staged values; call [`ShaderProgram::update`] for that.
    pub fn use_program(&mut self, state: &RenderingState, target: &TargetLayout, raster: &RasterState) {
        let key = (target.clone(), *raster);
        if let Some(pipeline) = self.pipelines.get(&key) {
            self.current = Some(pipeline.clone());
            return;
        }
        let vertex_attributes = self.interface.vertex_attributes();
        let vertex_layouts: Vec<wgpu::VertexBufferLayout> = vertex_attributes
            .iter()
            .map(|attribute| wgpu::VertexBufferLayout {
                array_stride: attribute.format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: std::slice::from_ref(attribute),
            })
            .collect();
        let pipeline = mk_render_pipeline(
            state.device(),
            &PipelineModules {
                vertex: &self.vertex,
                fragment: &self.fragment,
                layout: &self.pipeline_layout,
                vertex_layouts: &vertex_layouts,
            },
            target,
            raster,
        );
        log::debug!("built pipeline for program {:?}: {:?} {:?}", self.id, target, raster);
        self.pipelines.insert(key, pipeline.clone());
        self.current = Some(pipeline);
    }

    /// Clears the selected pipeline and the resolved draw inputs.
    pub fn unuse(&mut self) {
        self.current = None;
        self.prepared = None;
    }

    pub fn is_in_use(&self) -> bool {
        self.current.is_some()
    }

    /// Applies every staged value.
    ///
    /// Uniform block images go into this frame's ring slots, textures and
    /// vertex buffers are fetched through `state`, and bind groups are rebuilt
    /// only when a bound resource changed.
    pub fn update(&mut self, state: &mut RenderingState) -> Result<()> {
        for (slot, value) in self.interface.apply_pending(&mut self.block_changed) {
            if let UniformValue::Sampler2D(texture) = value {
                self.textures[slot] = texture;
            }
        }

        let mut offsets = Vec::with_capacity(self.rings.len());
        for (block, ring) in self.rings.iter_mut().enumerate() {
            let changed = std::mem::take(&mut self.block_changed[block]);
            offsets.push(ring.push(state, &self.interface.staging[block], changed));
        }

        let mut resolved: Vec<GpuTexture> = Vec::with_capacity(self.textures.len());
        for (slot, texture) in self.textures.iter().enumerate() {
            let layout = &self.interface.textures[slot];
            let depth = layout.sample == SampleKind::Depth;
            let gpu = match texture {
                Some(texture) => state.get_texture(texture)?,
                None => state.fallback_texture(depth),
            };
            if gpu.is_depth() != depth {
                return Err(Error::UnsupportedValue {
                    name: layout.name.clone(),
                    expected: if depth { "depth texture" } else { "color texture" }.to_string(),
                    got: format!("{:?}", gpu.format),
                });
            }
            resolved.push(gpu);
        }
        let comparison = self
            .interface
            .textures
            .iter()
            .any(|t| matches!(t.sampler, Some((_, SamplerKind::Comparison))))
            .then(|| state.comparison_sampler());

        let mut bind_groups = Vec::with_capacity(self.group_layouts.len());
        for (group, entries) in self.interface.groups.iter().enumerate() {
            let key: Vec<u64> = entries
                .iter()
                .flat_map(|(_, entry)| match entry {
                    GroupEntry::Block(block) => [self.rings[*block].generation, 0, 0],
                    GroupEntry::Texture(slot) | GroupEntry::Sampler(slot) => {
                        let texture = &resolved[*slot];
                        [texture.native_id.0, texture.storage, texture.sync]
                    }
                })
                .collect();
            let reusable = matches!(&self.bind_groups[group], Some((cached, _)) if *cached == key);
            if !reusable {
                let bind_entries: Vec<wgpu::BindGroupEntry> = entries
                    .iter()
                    .map(|(binding, entry)| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: match entry {
                            GroupEntry::Block(block) => {
                                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer: &self.rings[*block].buffer,
                                    offset: 0,
                                    size: wgpu::BufferSize::new(
                                        self.interface.blocks[*block].size as u64,
                                    ),
                                })
                            }
                            GroupEntry::Texture(slot) => {
                                wgpu::BindingResource::TextureView(&resolved[*slot].view)
                            }
                            GroupEntry::Sampler(slot) => {
                                match (&self.interface.textures[*slot].sampler, &comparison) {
                                    (Some((_, SamplerKind::Comparison)), Some(sampler)) => {
                                        wgpu::BindingResource::Sampler(sampler)
                                    }
                                    _ => wgpu::BindingResource::Sampler(&resolved[*slot].sampler),
                                }
                            }
                        },
                    })
                    .collect();
                let bind_group = state.device().create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("program_bind_group"),
                    layout: &self.group_layouts[group],
                    entries: &bind_entries,
                });
                state.record_bind_group();
                self.bind_groups[group] = Some((key, bind_group));
            }
            let dynamic_offsets: Vec<u32> = entries
                .iter()
                .filter_map(|(_, entry)| match entry {
                    GroupEntry::Block(block) => Some(offsets[*block]),
                    _ => None,
                })
                .collect();
            if let Some((_, bind_group)) = &self.bind_groups[group] {
                bind_groups.push((bind_group.clone(), dynamic_offsets));
            }
        }

        let mut vertex_buffers = Vec::new();
        for attribute in self.interface.sorted_attributes() {
            let buffer = attribute.buffer().ok_or_else(|| {
                Error::configuration(format!(
                    "attribute \"{}\" has no buffer staged",
                    attribute.name()
                ))
            })?;
            vertex_buffers.push(state.get_geometry_buffer(buffer)?.buffer);
        }

        self.prepared = Some(PreparedDraw {
            bind_groups,
            vertex_buffers,
        });
        Ok(())
    }

    /// Records a triangle-list draw of `count` vertices with the resolved inputs.
    pub fn draw(&self, pass: &mut wgpu::RenderPass, count: u32) -> Result<()> {
        let pipeline = self
            .current
            .as_ref()
            .ok_or_else(|| Error::configuration("program drawn while not in use"))?;
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| Error::configuration("program drawn before update"))?;
        pass.set_pipeline(pipeline);
        for (index, (bind_group, offsets)) in prepared.bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, bind_group, offsets);
        }
        for (slot, buffer) in prepared.vertex_buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.draw(0..count, 0..1);
        Ok(())
    }
}

fn layout_entry(interface: &ShaderInterface, binding: u32, entry: GroupEntry) -> wgpu::BindGroupLayoutEntry {
    let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
    let ty = match entry {
        GroupEntry::Block(block) => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: wgpu::BufferSize::new(interface.blocks[block].size as u64),
        },
        GroupEntry::Texture(slot) => wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: match interface.textures[slot].sample {
                SampleKind::Float => wgpu::TextureSampleType::Float { filterable: true },
                SampleKind::Depth => wgpu::TextureSampleType::Depth,
            },
        },
        GroupEntry::Sampler(slot) => wgpu::BindingType::Sampler(
            match interface.textures[slot].sampler {
                Some((_, SamplerKind::Comparison)) => wgpu::SamplerBindingType::Comparison,
                Some((_, SamplerKind::NonFiltering)) => wgpu::SamplerBindingType::NonFiltering,
                _ => wgpu::SamplerBindingType::Filtering,
            },
        ),
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty,
        count: None,
    }
}
