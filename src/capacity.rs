use thiserror::Error;

/// Voxel field edge length in cells.
pub const CHUNK_SIZE: u32 = 80;
/// Edge length of one compute workgroup; one workgroup covers one sub-region.
pub const WORKGROUP_EXTENT: u32 = 8;
/// Sub-region grid edge length (sub-regions per chunk axis).
pub const SUB_REGION_GRID: u32 = CHUNK_SIZE / WORKGROUP_EXTENT;

/// 6 faces * 4 vertices per face.
pub const MAX_VERTICES_PER_VOXEL: u64 = 24;
/// 6 faces * 6 indices per face.
pub const MAX_INDICES_PER_VOXEL: u64 = 36;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    #[error("chunk size must be non-zero")]
    ZeroChunkSize,
    #[error("workgroup extent must be non-zero")]
    ZeroWorkgroupExtent,
    #[error("chunk size {chunk_size} is not divisible by workgroup extent {workgroup_extent}")]
    MisalignedChunk {
        chunk_size: u32,
        workgroup_extent: u32,
    },
}

/// Worst-case sizing for every preallocated pipeline buffer.
///
/// The mesh kernel can never emit more than `MAX_VERTICES_PER_VOXEL` vertices
/// per cell, so buffers sized from a plan can never overflow regardless of
/// field contents. Changing the chunk dimensions requires a new plan and a
/// fresh buffer allocation; nothing resizes in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPlan {
    pub chunk_size: u32,
    pub workgroup_extent: u32,
    pub voxel_count: u64,
    pub vertex_capacity: u64,
    pub index_capacity: u64,
    pub sub_region_grid: u32,
    pub sub_region_count: u64,
}

impl CapacityPlan {
    pub fn for_chunk(chunk_size: u32, workgroup_extent: u32) -> Result<Self, CapacityError> {
        if chunk_size == 0 {
            return Err(CapacityError::ZeroChunkSize);
        }
        if workgroup_extent == 0 {
            return Err(CapacityError::ZeroWorkgroupExtent);
        }
        if chunk_size % workgroup_extent != 0 {
            return Err(CapacityError::MisalignedChunk {
                chunk_size,
                workgroup_extent,
            });
        }

        let voxel_count = (chunk_size as u64).pow(3);
        let sub_region_grid = chunk_size / workgroup_extent;
        Ok(Self {
            chunk_size,
            workgroup_extent,
            voxel_count,
            vertex_capacity: voxel_count * MAX_VERTICES_PER_VOXEL,
            index_capacity: voxel_count * MAX_INDICES_PER_VOXEL,
            sub_region_grid,
            sub_region_count: (sub_region_grid as u64).pow(3),
        })
    }

    /// Workgroup count per dispatch axis; every stage dispatches
    /// `(n, n, n)` workgroups so that one workgroup maps to one sub-region.
    pub fn dispatch_extent(&self) -> u32 {
        self.sub_region_grid
    }
}
