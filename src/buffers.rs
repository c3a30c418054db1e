use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::capacity::CapacityPlan;

/// Mesh vertex as written by the mesh kernel. Scalar fields keep the layout
/// at 32 bytes with no WGSL vec3 padding mismatch.
#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

/// Whole-chunk totals. During the feedback stage the two fields are the
/// atomic reservation cursors; once the stage completes they read as the
/// frame's true vertex/index totals. Must be all-zero before every frame's
/// feedback dispatch.
#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct ChunkFeedback {
    pub vertex_count: u32,
    pub index_count: u32,
}

/// Per-sub-region counts and the offsets reserved for that region's output.
#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct SubRegionFeedback {
    pub vertex_count: u32,
    pub index_count: u32,
    pub vertex_offset: u32,
    pub index_offset: u32,
}

/// Non-indexed indirect draw arguments, wire layout of `draw_indirect`.
#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct IndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

/// Indexed indirect draw arguments, wire layout of `draw_indexed_indirect`.
#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct IndexedIndirectArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

/// Byte offset of `ChunkFeedback::index_count`, the field published into the
/// data-driven indirect args after the feedback stage.
const CHUNK_FEEDBACK_INDEX_COUNT_OFFSET: u64 = 4;

/// Owns every preallocated pipeline buffer. Allocated once from a
/// `CapacityPlan`, mutated in place every frame, released by `Drop`.
pub struct GeometryBuffers {
    pub voxels: wgpu::Buffer,
    pub chunk_feedback: wgpu::Buffer,
    pub sub_region_feedback: wgpu::Buffer,
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    /// Refreshed from `ChunkFeedback` every frame.
    pub data_driven_args: wgpu::Buffer,
    /// Written once at startup with the worst-case vertex count.
    pub fixed_args: wgpu::Buffer,
    /// Written once at startup with the worst-case index count.
    pub fixed_indexed_args: wgpu::Buffer,
}

impl GeometryBuffers {
    pub fn new(device: &wgpu::Device, plan: &CapacityPlan) -> Self {
        let voxels = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Field Buffer"),
            size: plan.voxel_count * std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let chunk_feedback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Feedback Buffer"),
            size: std::mem::size_of::<ChunkFeedback>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sub_region_feedback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sub-Region Feedback Buffer"),
            size: plan.sub_region_count * std::mem::size_of::<SubRegionFeedback>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Vertex Buffer"),
            size: plan.vertex_capacity * std::mem::size_of::<Vertex>() as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        // Bound as storage for the mesh kernel and the procedural draw path,
        // and as a real index buffer for the indexed-indirect path.
        let indices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Index Buffer"),
            size: plan.index_capacity * std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDEX,
            mapped_at_creation: false,
        });

        let data_driven_args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Data-Driven Indirect Args"),
            contents: bytemuck::cast_slice(&[IndirectArgs {
                vertex_count: 0,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }]),
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        });

        let fixed_args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fixed Indirect Args"),
            contents: bytemuck::cast_slice(&[IndirectArgs {
                vertex_count: plan.vertex_capacity as u32,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }]),
            usage: wgpu::BufferUsages::INDIRECT,
        });

        let fixed_indexed_args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fixed Indexed Indirect Args"),
            contents: bytemuck::cast_slice(&[IndexedIndirectArgs {
                index_count: plan.index_capacity as u32,
                instance_count: 1,
                first_index: 0,
                base_vertex: 0,
                first_instance: 0,
            }]),
            usage: wgpu::BufferUsages::INDIRECT,
        });

        Self {
            voxels,
            chunk_feedback,
            sub_region_feedback,
            vertices,
            indices,
            data_driven_args,
            fixed_args,
            fixed_indexed_args,
        }
    }

    /// Copies the frame's true index total into the data-driven indirect
    /// args. Recorded after the feedback dispatch and before the draw that
    /// consumes the args; queue ordering does the rest.
    pub fn publish_frame_total(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(
            &self.chunk_feedback,
            CHUNK_FEEDBACK_INDEX_COUNT_OFFSET,
            &self.data_driven_args,
            0,
            std::mem::size_of::<u32>() as u64,
        );
    }

    /// Zeroes the whole-chunk cursors and every sub-region record so the
    /// next frame's feedback stage starts counting from a clean slate.
    /// Recorded after the draw submission that consumed this frame's totals.
    pub fn reset_feedback(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.chunk_feedback, 0, None);
        encoder.clear_buffer(&self.sub_region_feedback, 0, None);
    }
}
