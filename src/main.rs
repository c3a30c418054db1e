fn main() {
    voxel_playground::run();
}
