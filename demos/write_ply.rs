//! This example generates a PLY file containing 3 hardcoded Gaussians.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example write-ply -- "path/to/output.ply"
//! ```

use glam::*;
use gs_point_cloud::{self as gs};

/// Get the SH DC term that evaluates to `color`.
fn sh0(color: Vec3) -> Vec3 {
    (color - 0.5) / gs::SH_C0
}

fn main() {
    let model_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "target/model.ply".to_string());

    let gaussians = vec![
        gs::Gaussian {
            rot: Quat::from_axis_angle((Vec3::X + Vec3::Y / 2.0 + Vec3::Z).normalize(), 0.5),
            pos: Vec3::ZERO,
            scale: Vec3::new(0.5, 1.0, 0.75),
            opacity: 0.9,
            sh0: sh0(Vec3::X),
            sh: [Vec3::ZERO; 15],
        },
        gs::Gaussian {
            rot: Quat::from_axis_angle((Vec3::X + Vec3::Z / 3.0).normalize(), 0.3),
            pos: Vec3::new(0.0, 8.0, 4.0),
            scale: Vec3::new(1.0, 1.9, 0.75),
            opacity: 0.6,
            sh0: sh0(Vec3::Y),
            sh: [Vec3::ZERO; 15],
        },
        gs::Gaussian {
            rot: Quat::from_axis_angle((Vec3::X - Vec3::Z).normalize(), 0.2),
            pos: Vec3::new(4.0, 0.0, 6.0),
            scale: Vec3::new(1.0, 1.1, 0.8),
            opacity: 0.3,
            sh0: sh0(Vec3::Z),
            sh: [Vec3::ZERO; 15],
        },
    ];

    let gaussians = gs::Gaussians::from_iter(gaussians).to_ply();

    println!("Writing {} gaussians to {}", gaussians.len(), model_path);

    gaussians
        .write_ply_file(&model_path)
        .expect("write PLY file");
}
