//! This example converts a Gaussian splatting model into a point cloud.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example convert -- "path/to/model.ply" "path/to/points.ply" ["path/to/transforms.json"] ["path/to/config.json"]
//! ```
//!
//! An empty transforms path skips loading transforms.

use std::path::PathBuf;

use gs_point_cloud::{self as gs};

fn main() {
    let mut args = std::env::args().skip(1);
    let model_path = args
        .next()
        .unwrap_or_else(|| "target/model.ply".to_string());
    let output_path = args
        .next()
        .unwrap_or_else(|| "target/points.ply".to_string());
    let transforms_path = args.next().filter(|s| !s.is_empty()).map(PathBuf::from);
    let config = match args.next() {
        Some(path) => gs::ConversionConfig::from_json_file(&path).expect("config"),
        None => gs::ConversionConfig {
            num_points: 100_000,
            ..Default::default()
        },
    };

    let converter = gs::Converter::from_config(config).expect("valid config");

    println!("Converting {model_path} to {output_path}");

    let report = converter
        .convert(&model_path, transforms_path.as_deref(), &output_path)
        .expect("conversion");

    println!(
        "Loaded {} gaussians, {} in bounding box, {} after cleaning.",
        report.loaded, report.after_bounding_box, report.after_cleaning,
    );
    println!(
        "Wrote {} points with {:?} colour.",
        report.points_written, report.colour_quality,
    );
}
