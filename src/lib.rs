#![doc = include_str!("../README.md")]

mod allocator;
mod bounding_box;
mod cleaner;
mod config;
mod converter;
mod error;
mod gaussian;
mod ply;
mod point_cloud;
mod sampler;
mod sh;
mod transform;

pub use allocator::*;
pub use bounding_box::*;
pub use cleaner::*;
pub use config::*;
pub use converter::*;
pub use error::*;
pub use gaussian::*;
pub use ply::*;
pub use point_cloud::*;
pub use sampler::*;
pub use sh::*;
pub use transform::*;

pub use glam;
