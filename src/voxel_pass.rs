use crate::buffers::GeometryBuffers;

/// The three voxel kernels share one bind group slot; each kernel gets its
/// own layout listing exactly the buffers it touches, so a buffer can only
/// reach a kernel through that kernel's named table below.
const KERNEL_GROUP_ID: u32 = 0;

// generate_voxels bindings
const GEN_VOXEL_BUFFER_IDX: u32 = 0;
const GEN_PARAMS_IDX: u32 = 1;

// gather_feedback bindings
const FEEDBACK_VOXEL_BUFFER_IDX: u32 = 0;
const FEEDBACK_SUB_REGION_IDX: u32 = 2;
const FEEDBACK_CHUNK_IDX: u32 = 3;

// mesh_voxels bindings
const MESH_VOXEL_BUFFER_IDX: u32 = 0;
const MESH_SUB_REGION_IDX: u32 = 2;
const MESH_VERTEX_BUFFER_IDX: u32 = 4;
const MESH_INDEX_BUFFER_IDX: u32 = 5;

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct VoxelPipelines {
    generate_pipeline: wgpu::ComputePipeline,
    feedback_pipeline: wgpu::ComputePipeline,
    mesh_pipeline: wgpu::ComputePipeline,
}

impl VoxelPipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let generate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Generate Voxels Bind Group Layout"),
                entries: &[
                    storage_entry(GEN_VOXEL_BUFFER_IDX),
                    wgpu::BindGroupLayoutEntry {
                        binding: GEN_PARAMS_IDX,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });
        let feedback_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Gather Feedback Bind Group Layout"),
                entries: &[
                    storage_entry(FEEDBACK_VOXEL_BUFFER_IDX),
                    storage_entry(FEEDBACK_SUB_REGION_IDX),
                    storage_entry(FEEDBACK_CHUNK_IDX),
                ],
            });
        let mesh_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Mesh Voxels Bind Group Layout"),
                entries: &[
                    storage_entry(MESH_VOXEL_BUFFER_IDX),
                    storage_entry(MESH_SUB_REGION_IDX),
                    storage_entry(MESH_VERTEX_BUFFER_IDX),
                    storage_entry(MESH_INDEX_BUFFER_IDX),
                ],
            });

        let shader = device.create_shader_module(wgpu::include_wgsl!("voxel.wgsl"));

        let generate_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Generate Voxels Pipeline Layout"),
            bind_group_layouts: &[&generate_bind_group_layout],
            push_constant_ranges: &[],
        });
        let feedback_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Gather Feedback Pipeline Layout"),
            bind_group_layouts: &[&feedback_bind_group_layout],
            push_constant_ranges: &[],
        });
        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Voxels Pipeline Layout"),
            bind_group_layouts: &[&mesh_bind_group_layout],
            push_constant_ranges: &[],
        });

        let generate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Generate Voxels Pipeline"),
            layout: Some(&generate_layout),
            module: &shader,
            entry_point: Some("generate_voxels"),
            compilation_options: Default::default(),
            cache: None,
        });
        let feedback_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Gather Feedback Pipeline"),
            layout: Some(&feedback_layout),
            module: &shader,
            entry_point: Some("gather_feedback"),
            compilation_options: Default::default(),
            cache: None,
        });
        let mesh_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Mesh Voxels Pipeline"),
            layout: Some(&mesh_layout),
            module: &shader,
            entry_point: Some("mesh_voxels"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            generate_pipeline,
            feedback_pipeline,
            mesh_pipeline,
        }
    }
}

pub struct VoxelBindings {
    generate_bind_group: wgpu::BindGroup,
    feedback_bind_group: wgpu::BindGroup,
    mesh_bind_group: wgpu::BindGroup,
}

impl VoxelBindings {
    pub fn new(
        device: &wgpu::Device,
        pipelines: &VoxelPipelines,
        buffers: &GeometryBuffers,
        params_uniform: &wgpu::Buffer,
    ) -> Self {
        let generate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Generate Voxels Bind Group"),
            layout: &pipelines
                .generate_pipeline
                .get_bind_group_layout(KERNEL_GROUP_ID),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: GEN_VOXEL_BUFFER_IDX,
                    resource: buffers.voxels.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: GEN_PARAMS_IDX,
                    resource: params_uniform.as_entire_binding(),
                },
            ],
        });
        let feedback_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Gather Feedback Bind Group"),
            layout: &pipelines
                .feedback_pipeline
                .get_bind_group_layout(KERNEL_GROUP_ID),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: FEEDBACK_VOXEL_BUFFER_IDX,
                    resource: buffers.voxels.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: FEEDBACK_SUB_REGION_IDX,
                    resource: buffers.sub_region_feedback.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: FEEDBACK_CHUNK_IDX,
                    resource: buffers.chunk_feedback.as_entire_binding(),
                },
            ],
        });
        let mesh_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Voxels Bind Group"),
            layout: &pipelines
                .mesh_pipeline
                .get_bind_group_layout(KERNEL_GROUP_ID),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: MESH_VOXEL_BUFFER_IDX,
                    resource: buffers.voxels.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: MESH_SUB_REGION_IDX,
                    resource: buffers.sub_region_feedback.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: MESH_VERTEX_BUFFER_IDX,
                    resource: buffers.vertices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: MESH_INDEX_BUFFER_IDX,
                    resource: buffers.indices.as_entire_binding(),
                },
            ],
        });

        Self {
            generate_bind_group,
            feedback_bind_group,
            mesh_bind_group,
        }
    }
}

impl<'a> VoxelPipelines {
    /// Records the whole per-frame compute sequence: field generation, then
    /// per-region counting with offset reservation, then mesh emission.
    /// Dispatches within one pass run in order with writes visible to the
    /// next dispatch, which is the only cross-stage synchronization needed.
    pub fn record<'pass>(
        &'a self,
        cpass: &mut wgpu::ComputePass<'pass>,
        bindings: &'a VoxelBindings,
        dispatch_extent: u32,
    ) where
        'a: 'pass,
    {
        cpass.set_pipeline(&self.generate_pipeline);
        cpass.set_bind_group(KERNEL_GROUP_ID, &bindings.generate_bind_group, &[]);
        cpass.dispatch_workgroups(dispatch_extent, dispatch_extent, dispatch_extent);

        cpass.set_pipeline(&self.feedback_pipeline);
        cpass.set_bind_group(KERNEL_GROUP_ID, &bindings.feedback_bind_group, &[]);
        cpass.dispatch_workgroups(dispatch_extent, dispatch_extent, dispatch_extent);

        cpass.set_pipeline(&self.mesh_pipeline);
        cpass.set_bind_group(KERNEL_GROUP_ID, &bindings.mesh_bind_group, &[]);
        cpass.dispatch_workgroups(dispatch_extent, dispatch_extent, dispatch_extent);
    }
}
