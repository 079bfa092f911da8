//! This example reads a point cloud PLY file and prints its bounds and mean color.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example read-points -- "path/to/points.ply"
//! ```

use glam::*;
use gs_point_cloud::{self as gs};

fn main() {
    let points_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "target/points.ply".to_string());

    println!("Reading points from {}", points_path);

    let points = gs::PlyPoints::read_ply_file(&points_path).expect("points");

    if points.is_empty() {
        println!("Point cloud is empty.");
        return;
    }

    let (min, max) = points.iter().fold(
        (Vec3::INFINITY, Vec3::NEG_INFINITY),
        |(min, max), point| (min.min(point.pos()), max.max(point.pos())),
    );
    let color = points
        .iter()
        .map(|point| point.color().as_vec3())
        .sum::<Vec3>()
        / points.len() as f32;

    println!(
        "Loaded {} points in {min} to {max}, mean color {color}.",
        points.len(),
    );
}
