use crate::buffers::GeometryBuffers;

const DRAW_GROUP_ID: u32 = 0;
const DRAW_VERTEX_BUFFER_IDX: u32 = 0;
const DRAW_INDEX_BUFFER_IDX: u32 = 1;
const DRAW_CAMERA_IDX: u32 = 2;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The three indirect submission strategies. All of them consume the same
/// vertex/index buffers, so switching modes between frames never reallocates
/// or migrates anything.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Draws the true per-frame index count published by the feedback stage.
    #[default]
    DataDriven,
    /// Draws the full worst-case vertex range from args written at startup.
    FixedCount,
    /// Indexed draw of the full worst-case index range, args from startup.
    FixedCountIndexed,
}

impl RenderMode {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::DataDriven),
            1 => Some(Self::FixedCount),
            2 => Some(Self::FixedCountIndexed),
            _ => None,
        }
    }
}

pub struct DrawPass {
    /// Vertex stage resolves `indices[vertex_index]` itself; used by the two
    /// non-indexed strategies.
    procedural_pipeline: wgpu::RenderPipeline,
    /// Vertex stage fetches `vertices[vertex_index]` directly; the index
    /// indirection happens through a real index buffer binding.
    indexed_pipeline: wgpu::RenderPipeline,
}

impl DrawPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let procedural_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw: Procedural Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: DRAW_VERTEX_BUFFER_IDX,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: DRAW_INDEX_BUFFER_IDX,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: DRAW_CAMERA_IDX,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });
        // No index-buffer binding here: in the indexed strategy that buffer
        // is bound through set_index_buffer instead.
        let indexed_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw: Indexed Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: DRAW_VERTEX_BUFFER_IDX,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: DRAW_CAMERA_IDX,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let shader = device.create_shader_module(wgpu::include_wgsl!("draw.wgsl"));

        let primitive = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: Default::default(),
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: Default::default(),
            conservative: false,
        };
        let depth_stencil = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        };

        let procedural_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw: Procedural Pipeline Layout"),
            bind_group_layouts: &[&procedural_bind_group_layout],
            push_constant_ranges: &[],
        });
        let procedural_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Draw: Procedural Pipeline"),
                layout: Some(&procedural_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_procedural"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(format.into())],
                }),
                primitive,
                depth_stencil: Some(depth_stencil.clone()),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let indexed_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw: Indexed Pipeline Layout"),
            bind_group_layouts: &[&indexed_bind_group_layout],
            push_constant_ranges: &[],
        });
        let indexed_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Draw: Indexed Pipeline"),
            layout: Some(&indexed_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_indexed"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(format.into())],
            }),
            primitive,
            depth_stencil: Some(depth_stencil),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            procedural_pipeline,
            indexed_pipeline,
        }
    }
}

pub struct DrawBindings {
    procedural_bind_group: wgpu::BindGroup,
    indexed_bind_group: wgpu::BindGroup,
}

impl DrawBindings {
    pub fn new(
        device: &wgpu::Device,
        pass: &DrawPass,
        buffers: &GeometryBuffers,
        camera_uniform: &wgpu::Buffer,
    ) -> Self {
        let procedural_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw: Procedural Bind Group"),
            layout: &pass
                .procedural_pipeline
                .get_bind_group_layout(DRAW_GROUP_ID),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: DRAW_VERTEX_BUFFER_IDX,
                    resource: buffers.vertices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: DRAW_INDEX_BUFFER_IDX,
                    resource: buffers.indices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: DRAW_CAMERA_IDX,
                    resource: camera_uniform.as_entire_binding(),
                },
            ],
        });
        let indexed_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw: Indexed Bind Group"),
            layout: &pass.indexed_pipeline.get_bind_group_layout(DRAW_GROUP_ID),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: DRAW_VERTEX_BUFFER_IDX,
                    resource: buffers.vertices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: DRAW_CAMERA_IDX,
                    resource: camera_uniform.as_entire_binding(),
                },
            ],
        });
        Self {
            procedural_bind_group,
            indexed_bind_group,
        }
    }
}

impl<'a> DrawPass {
    /// Submits the draw for the selected strategy. The args buffers were
    /// prepared either by this frame's feedback stage (data-driven) or once
    /// at startup (fixed variants); nothing here reads geometry back.
    pub fn record<'pass>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'pass>,
        bindings: &'a DrawBindings,
        buffers: &'a GeometryBuffers,
        mode: RenderMode,
    ) where
        'a: 'pass,
    {
        match mode {
            RenderMode::DataDriven => {
                rpass.set_pipeline(&self.procedural_pipeline);
                rpass.set_bind_group(DRAW_GROUP_ID, &bindings.procedural_bind_group, &[]);
                rpass.draw_indirect(&buffers.data_driven_args, 0);
            }
            RenderMode::FixedCount => {
                rpass.set_pipeline(&self.procedural_pipeline);
                rpass.set_bind_group(DRAW_GROUP_ID, &bindings.procedural_bind_group, &[]);
                rpass.draw_indirect(&buffers.fixed_args, 0);
            }
            RenderMode::FixedCountIndexed => {
                rpass.set_pipeline(&self.indexed_pipeline);
                rpass.set_bind_group(DRAW_GROUP_ID, &bindings.indexed_bind_group, &[]);
                rpass.set_index_buffer(buffers.indices.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed_indirect(&buffers.fixed_indexed_args, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_indices_match_the_ui_contract() {
        assert_eq!(RenderMode::from_index(0), Some(RenderMode::DataDriven));
        assert_eq!(RenderMode::from_index(1), Some(RenderMode::FixedCount));
        assert_eq!(
            RenderMode::from_index(2),
            Some(RenderMode::FixedCountIndexed)
        );
        assert_eq!(RenderMode::from_index(3), None);
    }
}
