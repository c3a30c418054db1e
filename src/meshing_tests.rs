//! CPU mirror of the count/reserve/emit protocol executed by the voxel
//! kernels, used to check the protocol invariants for any reservation order.

use crate::buffers::{ChunkFeedback, SubRegionFeedback};
use crate::capacity::{CapacityPlan, CHUNK_SIZE, WORKGROUP_EXTENT};

struct TestRng(u64);

impl TestRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // SplitMix64 for deterministic, repeatable test vectors.
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

const FACE_DIRS: [[i32; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// Dense occupancy grid with the same addressing as the GPU field.
struct Field {
    size: i32,
    cells: Vec<u8>,
}

impl Field {
    fn empty(size: u32) -> Self {
        Self {
            size: size as i32,
            cells: vec![0; (size as usize).pow(3)],
        }
    }

    fn full(size: u32) -> Self {
        Self {
            size: size as i32,
            cells: vec![1; (size as usize).pow(3)],
        }
    }

    fn random(size: u32, rng: &mut TestRng) -> Self {
        let mut field = Self::empty(size);
        for cell in field.cells.iter_mut() {
            *cell = (rng.next_u64() & 1) as u8;
        }
        field
    }

    fn set(&mut self, x: i32, y: i32, z: i32) {
        let n = self.size;
        self.cells[(x + y * n + z * n * n) as usize] = 1;
    }

    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        if x < 0 || y < 0 || z < 0 || x >= self.size || y >= self.size || z >= self.size {
            return false;
        }
        let n = self.size;
        self.cells[(x + y * n + z * n * n) as usize] != 0
    }

    fn region_grid(&self) -> i32 {
        self.size / WORKGROUP_EXTENT as i32
    }

    fn region_count(&self) -> usize {
        (self.region_grid() as usize).pow(3)
    }
}

fn visible_face_count(field: &Field, x: i32, y: i32, z: i32) -> u32 {
    if !field.is_solid(x, y, z) {
        return 0;
    }
    FACE_DIRS
        .iter()
        .filter(|d| !field.is_solid(x + d[0], y + d[1], z + d[2]))
        .count() as u32
}

/// Stage-2 counting rule for one sub-region, identified by its linear index.
fn count_region(field: &Field, region: usize) -> (u32, u32) {
    let g = field.region_grid();
    let e = WORKGROUP_EXTENT as i32;
    let rx = region as i32 % g;
    let ry = region as i32 / g % g;
    let rz = region as i32 / (g * g);

    let mut faces = 0;
    for z in rz * e..(rz + 1) * e {
        for y in ry * e..(ry + 1) * e {
            for x in rx * e..(rx + 1) * e {
                faces += visible_face_count(field, x, y, z);
            }
        }
    }
    (faces * 4, faces * 6)
}

/// Stage-3 emission mirror for one sub-region: walks the same cells with the
/// same visibility rule, advancing local cursors by 4 and 6 per face exactly
/// as the mesh kernel does.
fn emit_region(field: &Field, region: usize) -> (u32, u32) {
    let g = field.region_grid();
    let e = WORKGROUP_EXTENT as i32;
    let rx = region as i32 % g;
    let ry = region as i32 / g % g;
    let rz = region as i32 / (g * g);

    let mut vertex_cursor = 0;
    let mut index_cursor = 0;
    for z in rz * e..(rz + 1) * e {
        for y in ry * e..(ry + 1) * e {
            for x in rx * e..(rx + 1) * e {
                if !field.is_solid(x, y, z) {
                    continue;
                }
                for d in FACE_DIRS {
                    if !field.is_solid(x + d[0], y + d[1], z + d[2]) {
                        vertex_cursor += 4;
                        index_cursor += 6;
                    }
                }
            }
        }
    }
    (vertex_cursor, index_cursor)
}

/// Runs the reservation protocol: one fetch-and-add pair per region, in the
/// given order. Returns the per-region feedback records (indexed by region,
/// not by reservation order) and the final cursor state.
fn reserve_offsets(counts: &[(u32, u32)], order: &[usize]) -> (Vec<SubRegionFeedback>, ChunkFeedback) {
    let mut cursor = ChunkFeedback::default();
    let mut feedback = vec![SubRegionFeedback::default(); counts.len()];
    for &region in order {
        let (verts, indices) = counts[region];
        let vertex_base = cursor.vertex_count;
        let index_base = cursor.index_count;
        cursor.vertex_count += verts;
        cursor.index_count += indices;
        feedback[region] = SubRegionFeedback {
            vertex_count: verts,
            index_count: indices,
            vertex_offset: vertex_base,
            index_offset: index_base,
        };
    }
    (feedback, cursor)
}

fn shuffled_order(len: usize, rng: &mut TestRng) -> Vec<usize> {
    let mut order = (0..len).collect::<Vec<_>>();
    for i in (1..len).rev() {
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
    order
}

fn all_region_counts(field: &Field) -> Vec<(u32, u32)> {
    (0..field.region_count())
        .map(|r| count_region(field, r))
        .collect()
}

#[test]
fn feedback_counts_conserve_into_chunk_totals() {
    for seed in [1u64, 0xDEAD_BEEF, 0x5555_AAAA_5555_AAAA] {
        let field = Field::random(CHUNK_SIZE, &mut TestRng::new(seed));
        let counts = all_region_counts(&field);
        let order = (0..counts.len()).collect::<Vec<_>>();
        let (feedback, cursor) = reserve_offsets(&counts, &order);

        let vertex_sum = feedback.iter().map(|f| f.vertex_count as u64).sum::<u64>();
        let index_sum = feedback.iter().map(|f| f.index_count as u64).sum::<u64>();
        assert_eq!(vertex_sum, cursor.vertex_count as u64);
        assert_eq!(index_sum, cursor.index_count as u64);
    }
}

#[test]
fn reserved_ranges_are_disjoint_for_any_reservation_order() {
    let plan = CapacityPlan::for_chunk(16, WORKGROUP_EXTENT).unwrap();
    let mut rng = TestRng::new(0xC0FF_EE00_1234_5678);
    let field = Field::random(16, &mut rng);
    let counts = all_region_counts(&field);

    for _ in 0..64 {
        let order = shuffled_order(counts.len(), &mut rng);
        let (feedback, cursor) = reserve_offsets(&counts, &order);

        let mut vertex_ranges = feedback
            .iter()
            .map(|f| (f.vertex_offset, f.vertex_count))
            .collect::<Vec<_>>();
        vertex_ranges.sort_unstable();
        for pair in vertex_ranges.windows(2) {
            assert!(
                pair[0].0 + pair[0].1 <= pair[1].0,
                "vertex ranges overlap: {:?}",
                pair
            );
        }

        let mut index_ranges = feedback
            .iter()
            .map(|f| (f.index_offset, f.index_count))
            .collect::<Vec<_>>();
        index_ranges.sort_unstable();
        for pair in index_ranges.windows(2) {
            assert!(
                pair[0].0 + pair[0].1 <= pair[1].0,
                "index ranges overlap: {:?}",
                pair
            );
        }

        assert!(cursor.vertex_count as u64 <= plan.vertex_capacity);
        assert!(cursor.index_count as u64 <= plan.index_capacity);
    }
}

#[test]
fn counting_matches_emission_for_an_unchanged_field() {
    let field = Field::random(CHUNK_SIZE, &mut TestRng::new(42));
    for region in 0..field.region_count() {
        let counted = count_region(&field, region);
        let emitted = emit_region(&field, region);
        assert_eq!(
            counted, emitted,
            "count/emit divergence in region {region}"
        );
    }
}

#[test]
fn reset_returns_all_counters_to_zero() {
    let field = Field::random(16, &mut TestRng::new(7));
    let counts = all_region_counts(&field);
    let order = (0..counts.len()).collect::<Vec<_>>();
    let (mut feedback, mut cursor) = reserve_offsets(&counts, &order);
    assert!(cursor.vertex_count > 0);

    // The per-frame reset clears both buffers to all-zero bytes.
    cursor = ChunkFeedback::default();
    feedback.fill(SubRegionFeedback::default());

    assert_eq!(cursor.vertex_count, 0);
    assert_eq!(cursor.index_count, 0);
    assert!(feedback
        .iter()
        .all(|f| f.vertex_count == 0 && f.index_count == 0 && f.vertex_offset == 0));
}

#[test]
fn empty_field_emits_nothing() {
    let field = Field::empty(CHUNK_SIZE);
    let counts = all_region_counts(&field);
    let order = (0..counts.len()).collect::<Vec<_>>();
    let (feedback, cursor) = reserve_offsets(&counts, &order);

    assert_eq!(cursor.vertex_count, 0);
    assert_eq!(cursor.index_count, 0);
    for (region, f) in feedback.iter().enumerate() {
        assert_eq!(emit_region(&field, region), (0, 0));
        assert_eq!((f.vertex_count, f.index_count), (0, 0));
    }
}

#[test]
fn isolated_voxel_attributes_all_faces_to_its_region() {
    let mut field = Field::empty(CHUNK_SIZE);
    // Cell (21, 34, 55) lives in region (2, 4, 6).
    field.set(21, 34, 55);
    let g = field.region_grid() as usize;
    let home_region = 2 + 4 * g + 6 * g * g;

    let counts = all_region_counts(&field);
    for (region, &(verts, indices)) in counts.iter().enumerate() {
        if region == home_region {
            assert_eq!((verts, indices), (24, 36));
        } else {
            assert_eq!((verts, indices), (0, 0));
        }
    }

    let order = (0..counts.len()).collect::<Vec<_>>();
    let (_, cursor) = reserve_offsets(&counts, &order);
    assert_eq!(cursor.vertex_count, 24);
    assert_eq!(cursor.index_count, 36);
}

#[test]
fn full_field_culls_interior_faces_and_stays_under_capacity() {
    let plan = CapacityPlan::for_chunk(CHUNK_SIZE, WORKGROUP_EXTENT).unwrap();
    let field = Field::full(CHUNK_SIZE);
    let counts = all_region_counts(&field);
    let order = (0..counts.len()).collect::<Vec<_>>();
    let (_, cursor) = reserve_offsets(&counts, &order);

    // Only the six chunk boundary planes survive culling.
    let boundary_faces = 6 * (CHUNK_SIZE as u32).pow(2);
    assert_eq!(cursor.vertex_count, boundary_faces * 4);
    assert_eq!(cursor.index_count, boundary_faces * 6);
    assert!((cursor.vertex_count as u64) < plan.vertex_capacity);
    assert!((cursor.index_count as u64) < plan.index_capacity);
}
