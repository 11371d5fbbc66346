use camcal_core::Corner;
use nalgebra::Vector2;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Absolute difference between two angles (radians), in `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Whether two undirected directions (angles modulo π) are orthogonal
/// within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let d = angle_diff_abs(reference_angle, other_angle);
    let d = d.min(PI - d);
    (FRAC_PI_2 - d).abs() <= tolerance.abs()
}

/// Angle between an undirected axis `axis_angle` (modulo π) and a directed
/// vector angle `vec_angle`, in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let d = angle_diff_abs(axis_angle, vec_angle);
    d.min(PI - d)
}

/// Dominant board axis from corner orientations.
///
/// Diagonal orientations alternate by π/2 between neighbouring corners, so
/// they are averaged in quadruple-angle space where both families agree.
/// The returned axis is rotated π/4 from the mean diagonal; the second
/// board axis is perpendicular to it. `None` when no direction dominates.
pub fn board_axis_angle(corners: &[Corner]) -> Option<f32> {
    let mut sum = Vector2::<f32>::zeros();
    let mut weight_sum = 0.0f32;

    for c in corners {
        let w = c.strength.max(0.0);
        if w <= 0.0 {
            continue;
        }
        let four_theta = 4.0 * c.orientation;
        sum += w * Vector2::new(four_theta.cos(), four_theta.sin());
        weight_sum += w;
    }

    if weight_sum <= 0.0 {
        return None;
    }
    let mean = sum / weight_sum;
    if mean.norm_squared() < 1e-6 {
        return None;
    }

    let diagonal = 0.25 * mean.y.atan2(mean.x);
    Some(diagonal + FRAC_PI_4)
}
