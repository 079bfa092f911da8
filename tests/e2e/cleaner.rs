use assert_matches::assert_matches;
use gs_point_cloud::{
    ConfigError, Gaussian, Gaussians, SparsePolicy, SurfaceDistanceTest, SurfaceOutlierCleaner,
    glam::*,
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::common::given;

fn given_surface_test() -> SurfaceDistanceTest {
    SurfaceDistanceTest::new(1.0, 4).unwrap()
}

#[test]
fn test_surface_outlier_cleaner_clean_when_opacity_below_floor_should_exclude() {
    let faint = Gaussian {
        opacity: 0.05,
        scale: Vec3::splat(10.0),
        ..given::gaussian_at(Vec3::ZERO)
    };
    let mut gaussians: Gaussians = [faint, given::gaussian_at(Vec3::X)].into_iter().collect();

    SurfaceOutlierCleaner::new(0.1)
        .unwrap()
        .clean(&mut gaussians);

    assert_eq!(gaussians.len(), 1);
    assert_eq!(gaussians.gaussians[0].pos, Vec3::X);
}

#[test]
fn test_surface_outlier_cleaner_keep_mask_when_min_opacity_raised_should_not_increase() {
    let gaussians = given::gaussians(40);

    let counts = [0.0, 0.15, 0.35, 0.55, 0.75, 1.0]
        .into_iter()
        .map(|min_opacity| {
            let cleaner = SurfaceOutlierCleaner::new(min_opacity)
                .unwrap()
                .with_surface_distance(given_surface_test());
            cleaner.keep_mask(&gaussians).into_iter().filter(|k| *k).count()
        })
        .collect::<Vec<_>>();

    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");
    assert_eq!(counts.last(), Some(&0));
}

#[test]
fn test_surface_outlier_cleaner_clean_when_surface_test_enabled_should_not_increase() {
    let gaussians = given::grid_with_floater();
    let floor = SurfaceOutlierCleaner::new(0.0).unwrap();

    let mut without = gaussians.clone();
    floor.clean(&mut without);
    let mut with = gaussians.clone();
    floor
        .with_surface_distance(given_surface_test())
        .clean(&mut with);

    assert!(with.len() <= without.len());
}

#[test]
fn test_surface_outlier_cleaner_clean_when_floater_isolated_should_remove_it() {
    let mut gaussians = given::grid_with_floater();

    SurfaceOutlierCleaner::default()
        .with_surface_distance(given_surface_test())
        .clean(&mut gaussians);

    assert_eq!(gaussians.len(), 25);
    assert!(gaussians.iter().all(|g| g.pos.z == 0.0));
}

#[test]
fn test_surface_distance_test_neighbour_distances_should_be_mean_neighbour_distance() {
    let gaussians = given::grid_with_floater();

    let distances = given_surface_test()
        .neighbour_distances(&gaussians)
        .unwrap();

    assert_eq!(distances.len(), 26);
    assert_eq!(distances[12], 1.0);
    assert!(distances[25] > 100.0);
}

#[test]
fn test_surface_distance_test_inlier_mask_when_sparse_and_reject_should_reject_all() {
    let gaussians = given::gaussians_at([Vec3::ZERO, Vec3::X, Vec3::Y]);
    let surface = SurfaceDistanceTest::new(2.0, 10).unwrap();

    assert_eq!(surface.sparse_policy(), SparsePolicy::Reject);
    assert_eq!(surface.inlier_mask(&gaussians), vec![false; 3]);
    assert_eq!(surface.neighbour_distances(&gaussians), None);
}

#[test]
fn test_surface_distance_test_inlier_mask_when_sparse_and_keep_should_keep_all() {
    let gaussians = given::gaussians_at([Vec3::ZERO, Vec3::X, Vec3::Y]);
    let surface = SurfaceDistanceTest::new(2.0, 10)
        .unwrap()
        .with_sparse_policy(SparsePolicy::Keep);

    assert_eq!(surface.inlier_mask(&gaussians), vec![true; 3]);
}

#[test]
fn test_surface_distance_test_inlier_mask_when_evenly_spaced_should_keep_all() {
    let gaussians = given::gaussians_at((0..10).map(|i| Vec3::X * i as f32));
    let surface = SurfaceDistanceTest::new(0.0, 2).unwrap();

    let mask = surface.inlier_mask(&gaussians);

    assert_eq!(mask.iter().filter(|k| **k).count(), 8);
    assert!(!mask[0] && !mask[9]);
}

#[test]
fn test_surface_distance_test_new_when_invalid_should_return_error() {
    assert_matches!(
        SurfaceDistanceTest::new(-1.0, 10),
        Err(ConfigError::InvalidSurfaceDistanceStd { value }) if value == -1.0
    );
    assert_matches!(
        SurfaceDistanceTest::new(f32::NAN, 10),
        Err(ConfigError::InvalidSurfaceDistanceStd { .. })
    );
    assert_matches!(
        SurfaceDistanceTest::new(1.0, 0),
        Err(ConfigError::InvalidNeighbours)
    );
}

#[test]
fn test_surface_outlier_cleaner_new_when_min_opacity_out_of_range_should_return_error() {
    for min_opacity in [-0.1, 1.5, f32::NAN] {
        assert_matches!(
            SurfaceOutlierCleaner::new(min_opacity),
            Err(ConfigError::InvalidMinOpacity { .. })
        );
    }
}

#[test]
fn test_surface_distance_test_neighbour_distances_when_scattered_should_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(0);
    let positions = (0..300)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(0.0..1.0),
            )
        })
        .collect::<Vec<_>>();
    let gaussians = given::gaussians_at(positions.iter().copied());
    let surface = SurfaceDistanceTest::new(1.0, 6).unwrap();

    let distances = surface.neighbour_distances(&gaussians).unwrap();

    for (i, &pos) in positions.iter().enumerate() {
        let mut brute_force = positions
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, p)| p.distance(pos))
            .collect::<Vec<_>>();
        brute_force.sort_by(f32::total_cmp);
        let expected = brute_force[..6].iter().sum::<f32>() / 6.0;

        assert!(
            (distances[i] - expected).abs() < 1e-4,
            "gaussian {i}: {} != {expected}",
            distances[i]
        );
    }
}

#[test]
fn test_surface_distance_test_neighbour_distances_when_centers_coincide_should_skip_only_self() {
    let gaussians = given::gaussians_at([Vec3::ZERO, Vec3::ZERO, Vec3::X * 2.0]);
    let surface = SurfaceDistanceTest::new(1.0, 1).unwrap();

    let distances = surface.neighbour_distances(&gaussians).unwrap();

    assert_eq!(distances, vec![0.0, 0.0, 2.0]);
}
