use gs_point_cloud::{
    ColourQuality, Gaussian, GaussianShDegree, Gaussians, PlyPointPod, PointSampler,
    SampleAllocation, ViewReference, glam::*,
};

use crate::common::given;

fn given_sampled_points(
    sampler: &PointSampler,
    gaussians: &Gaussians,
    allocation: &SampleAllocation,
) -> Vec<PlyPointPod> {
    let mut points = Vec::new();
    sampler
        .sample(gaussians, allocation, |batch| {
            points.extend_from_slice(batch);
            Ok::<_, ()>(())
        })
        .unwrap();
    points
}

#[test]
fn test_point_sampler_sample_when_seed_fixed_should_be_reproducible() {
    let gaussians = given::gaussians(20);
    let allocation = SampleAllocation::new(&gaussians, 5000);
    let sampler = PointSampler::new(7);

    let a = given_sampled_points(&sampler, &gaussians, &allocation);
    let b = given_sampled_points(&sampler, &gaussians, &allocation);

    assert_eq!(a.len(), 5000);
    assert_eq!(a, b);
}

#[test]
fn test_point_sampler_sample_when_batch_size_differs_should_be_identical() {
    let gaussians = given::gaussians(20);
    let allocation = SampleAllocation::new(&gaussians, 5000);

    let whole = given_sampled_points(&PointSampler::new(7), &gaussians, &allocation);
    for batch_points in [1, 13, 256, 1000] {
        let sampler = PointSampler::new(7).with_batch_points(batch_points);

        let batched = given_sampled_points(&sampler, &gaussians, &allocation);

        assert_eq!(batched, whole, "batch points {batch_points}");
    }
}

#[test]
fn test_point_sampler_sample_when_seed_differs_should_differ() {
    let gaussians = given::gaussians(5);
    let allocation = SampleAllocation::new(&gaussians, 100);

    let a = given_sampled_points(&PointSampler::new(1), &gaussians, &allocation);
    let b = given_sampled_points(&PointSampler::new(2), &gaussians, &allocation);

    assert_ne!(a, b);
}

#[test]
fn test_point_sampler_sample_should_follow_allocation_order() {
    let gaussians = given::gaussians_at([Vec3::ZERO, Vec3::splat(100.0), Vec3::splat(-100.0)]);
    let allocation = SampleAllocation::from_weights(&[1.0, 2.0, 1.0], 400);
    let sampler = PointSampler::new(0).with_batch_points(64);

    let points = given_sampled_points(&sampler, &gaussians, &allocation);

    assert_eq!(points.len(), 400);
    for (i, gaussian) in gaussians.iter().enumerate() {
        let range = allocation.range(i);
        assert!(
            points[range.start as usize..range.end as usize]
                .iter()
                .all(|p| p.pos().distance(gaussian.pos) < 1.0),
            "gaussian {i}"
        );
    }
}

#[test]
fn test_point_sampler_sample_should_follow_gaussian_distribution() {
    let gaussian = Gaussian {
        rot: Quat::from_rotation_y(0.7),
        pos: Vec3::new(3.0, -2.0, 1.0),
        scale: Vec3::new(2.0, 0.5, 1.0),
        ..given::gaussian_at(Vec3::ZERO)
    };
    let gaussians: Gaussians = std::iter::once(gaussian).collect();
    let allocation = SampleAllocation::new(&gaussians, 20_000);

    let points = given_sampled_points(&PointSampler::new(3), &gaussians, &allocation);

    let n = points.len() as f32;
    let mean = points.iter().map(PlyPointPod::pos).sum::<Vec3>() / n;
    let covariance = points
        .iter()
        .map(|p| {
            let d = p.pos() - mean;
            Mat3::from_cols(d * d.x, d * d.y, d * d.z)
        })
        .fold(Mat3::ZERO, |a, b| a + b)
        * (1.0 / n);
    let expected = gaussian.covariance();

    assert!(mean.abs_diff_eq(gaussian.pos, 0.1), "{mean:?}");
    for (a, b) in covariance
        .to_cols_array()
        .into_iter()
        .zip(expected.to_cols_array())
    {
        assert!((a - b).abs() < 0.4, "{covariance:?} != {expected:?}");
    }
}

#[test]
fn test_point_sampler_sample_when_single_gaussian_exceeds_batch_should_be_identical() {
    let gaussians = given::gaussians(1);
    let allocation = SampleAllocation::new(&gaussians, 1050);

    let whole = given_sampled_points(&PointSampler::new(9), &gaussians, &allocation);
    let chunked = given_sampled_points(
        &PointSampler::new(9).with_batch_points(100),
        &gaussians,
        &allocation,
    );

    assert_eq!(chunked.len(), 1050);
    assert_eq!(chunked, whole);
}

#[test]
fn test_point_sampler_sample_when_sink_fails_should_return_error() {
    let gaussians = given::gaussians(3);
    let allocation = SampleAllocation::new(&gaussians, 30);
    let sampler = PointSampler::new(0).with_batch_points(10);

    let mut calls = 0;
    let result = sampler.sample(&gaussians, &allocation, |_| {
        calls += 1;
        Err("full")
    });

    assert_eq!(result, Err("full"));
    assert_eq!(calls, 1);
}

#[test]
fn test_point_sampler_sample_when_allocation_empty_should_not_call_sink() {
    let gaussians = Gaussians::default();
    let allocation = SampleAllocation::new(&gaussians, 1000);

    let points = given_sampled_points(&PointSampler::new(0), &gaussians, &allocation);

    assert!(points.is_empty());
}

#[test]
fn test_point_sampler_color_when_diffuse_should_use_dc() {
    let gaussian = Gaussian {
        sh0: given::sh0(Vec3::new(1.0, 0.5, 0.0)),
        ..given::gaussian()
    };
    let sampler = PointSampler::new(0).with_colour_quality(ColourQuality::Diffuse);

    let color = sampler.color(&gaussian, GaussianShDegree::default());

    assert_eq!(color, U8Vec3::new(255, 128, 0));
}

#[test]
fn test_point_sampler_color_when_full_and_degree_0_should_equal_diffuse() {
    let gaussian = given::gaussian();
    let degree = GaussianShDegree::new(0).unwrap();

    let full = PointSampler::new(0).color(&gaussian, degree);
    let diffuse = PointSampler::new(0)
        .with_colour_quality(ColourQuality::Diffuse)
        .color(&gaussian, degree);

    assert_eq!(full, diffuse);
}

#[test]
fn test_point_sampler_color_when_full_should_evaluate_in_view_direction() {
    let mut gaussian = Gaussian {
        pos: Vec3::new(0.0, 0.0, 5.0),
        sh0: Vec3::ZERO,
        ..given::gaussian_at(Vec3::ZERO)
    };
    gaussian.sh[1] = Vec3::splat(1.0);
    let degree = GaussianShDegree::new(1).unwrap();

    let from_below = PointSampler::new(0)
        .with_view_reference(ViewReference::From(Vec3::ZERO))
        .color(&gaussian, degree);
    let from_above = PointSampler::new(0)
        .with_view_reference(ViewReference::From(Vec3::new(0.0, 0.0, 10.0)))
        .color(&gaussian, degree);

    assert!(from_below.x > 128 && from_above.x < 128);
    assert_eq!(
        from_below,
        (gaussian.color_in(degree, Vec3::Z) * 255.0).round().as_u8vec3()
    );
}

#[test]
fn test_view_reference_direction_when_at_origin_should_fall_back_to_dominant_axis() {
    let gaussian = Gaussian {
        scale: Vec3::new(0.1, 0.1, 0.5),
        ..given::gaussian_at(Vec3::ONE)
    };

    let direction = ViewReference::From(Vec3::ONE).direction(&gaussian);

    assert_eq!(direction, Vec3::Z);
}
