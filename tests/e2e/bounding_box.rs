use assert_matches::assert_matches;
use gs_point_cloud::{BoundingBox, ConfigError, glam::*};

use crate::common::given;

fn given_unit_box() -> BoundingBox {
    BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0)).unwrap()
}

#[test]
fn test_bounding_box_filter_when_3_of_10_outside_should_retain_7() {
    let mut gaussians = given::gaussians_at([
        Vec3::ZERO,
        Vec3::splat(0.5),
        Vec3::splat(-0.5),
        Vec3::new(0.9, -0.9, 0.1),
        Vec3::new(-1.0, 0.0, 1.0),
        Vec3::splat(1.0),
        Vec3::new(0.0, 0.3, -0.7),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, -1.5, 0.0),
        Vec3::new(0.0, 0.0, 1.01),
    ]);

    given_unit_box().filter(&mut gaussians);

    assert_eq!(gaussians.len(), 7);
    assert!(gaussians.iter().all(|g| g.pos.abs().max_element() <= 1.0));
}

#[test]
fn test_bounding_box_filter_when_applied_twice_should_be_idempotent() {
    let mut once = given::gaussians(20);
    let bounding_box = BoundingBox::new(Vec3::splat(5.0), Vec3::splat(14.0)).unwrap();

    bounding_box.filter(&mut once);
    let mut twice = once.clone();
    bounding_box.filter(&mut twice);

    assert!(!once.is_empty());
    assert_eq!(once.gaussians, twice.gaussians);
}

#[test]
fn test_bounding_box_filter_when_nothing_inside_should_return_empty() {
    let mut gaussians = given::gaussians_at([Vec3::splat(5.0), Vec3::splat(-5.0)]);

    given_unit_box().filter(&mut gaussians);

    assert!(gaussians.is_empty());
}

#[test]
fn test_bounding_box_contains_when_on_face_should_be_true() {
    let bounding_box = given_unit_box();

    assert!(bounding_box.contains(Vec3::new(1.0, -1.0, 0.0)));
    assert!(!bounding_box.contains(Vec3::new(1.0 + 1e-6, 0.0, 0.0)));
}

#[test]
fn test_bounding_box_new_when_min_not_less_than_max_should_return_error() {
    let result = BoundingBox::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 1.0));

    assert_matches!(
        result,
        Err(ConfigError::InvalidBoundingBox { axis: 1, min, max }) if min == 1.0 && max == 1.0
    );
}
