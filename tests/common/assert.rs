use gs_point_cloud::{Gaussian, glam::*};

pub struct GaussianOptions {
    pub pos_epsilon: f32,
    pub rot_epsilon: f32,
    pub opacity_epsilon: f32,
    pub sh_epsilon: f32,
    pub scale_epsilon: f32,
}

impl Default for GaussianOptions {
    fn default() -> Self {
        Self {
            pos_epsilon: 1e-4,
            rot_epsilon: 1e-4,
            opacity_epsilon: 1e-4,
            sh_epsilon: 1e-4,
            scale_epsilon: 1e-4,
        }
    }
}

pub fn gaussian(
    a: &Gaussian,
    b: &Gaussian,
    GaussianOptions {
        pos_epsilon,
        rot_epsilon,
        opacity_epsilon,
        sh_epsilon,
        scale_epsilon,
    }: GaussianOptions,
) {
    assert!(
        a.rot.abs_diff_eq(b.rot, rot_epsilon) || a.rot.abs_diff_eq(-b.rot, rot_epsilon),
        "rotation assertion failed\n left: {:?}\nright: {:?}",
        a.rot,
        b.rot
    );

    assert!(
        a.pos.abs_diff_eq(b.pos, pos_epsilon),
        "position assertion failed\n left: {:?}\nright: {:?}",
        a.pos,
        b.pos
    );

    assert!(
        (a.opacity - b.opacity).abs() < opacity_epsilon,
        "opacity assertion failed\n left: {:?}\nright: {:?}",
        a.opacity,
        b.opacity
    );

    assert!(
        a.sh0.abs_diff_eq(b.sh0, sh_epsilon),
        "sh0 assertion failed\n left: {:?}\nright: {:?}",
        a.sh0,
        b.sh0
    );

    for i in 0..15 {
        assert!(
            a.sh[i].abs_diff_eq(b.sh[i], sh_epsilon),
            "sh[{}] assertion failed\n left: {:?}\nright: {:?}",
            i,
            a.sh[i],
            b.sh[i]
        );
    }

    assert!(
        a.scale.abs_diff_eq(b.scale, scale_epsilon),
        "scale assertion failed\n left: {:?}\nright: {:?}",
        a.scale,
        b.scale
    );
}

pub fn mat4(a: &Mat4, b: &Mat4) {
    const EPSILON: f32 = 1e-5;

    assert!(
        a.abs_diff_eq(*b, EPSILON),
        "matrix assertion failed\n left: {:?}\nright: {:?}",
        a,
        b
    );
}

pub fn vec3(a: Vec3, b: Vec3, epsilon: f32) {
    assert!(
        a.abs_diff_eq(b, epsilon),
        "vector assertion failed\n left: {:?}\nright: {:?}",
        a,
        b
    );
}
