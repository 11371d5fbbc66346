//! Closed-form intrinsic initialisation from board homographies.

use crate::camera::{CameraMatrix, ImageSize};
use log::debug;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// Initial pinhole intrinsics.
///
/// The principal point is fixed at the image centre `((w-1)/2, (h-1)/2)`.
/// Focal lengths follow from two constraints per view on the rotation columns
/// `r1 ∝ K⁻¹h1`, `r2 ∝ K⁻¹h2`: `r1 ⟂ r2`, and the diagonals `r1 ± r2` are
/// orthogonal (equal column norms). With `K = diag(fx, fy, 1)` both are
/// linear in `(1/fx², 1/fy²)` and solved in least squares.
///
/// Views parallel to the image plane carry no focal information; when the
/// system is degenerate both focal lengths fall back to `max(w, h)`.
pub fn initial_camera_matrix(homographies: &[Matrix3<f64>], size: ImageSize) -> CameraMatrix {
    let cx = (size.width as f64 - 1.0) * 0.5;
    let cy = (size.height as f64 - 1.0) * 0.5;
    let fallback = size.width.max(size.height).max(1) as f64;
    let fallback_matrix = CameraMatrix {
        fx: fallback,
        fy: fallback,
        cx,
        cy,
    };

    if homographies.is_empty() {
        return fallback_matrix;
    }

    let shift = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let mut a = DMatrix::<f64>::zeros(2 * homographies.len(), 2);
    let mut b = DVector::<f64>::zeros(2 * homographies.len());

    for (k, h) in homographies.iter().enumerate() {
        let hs = shift * h;
        let c1: Vector3<f64> = hs.column(0).into_owned();
        let c2: Vector3<f64> = hs.column(1).into_owned();
        let d1 = (c1 + c2) * 0.5;
        let d2 = (c1 - c2) * 0.5;

        let rows = [(unit(&c1), unit(&c2)), (unit(&d1), unit(&d2))];
        for (r, (u, v)) in rows.into_iter().enumerate() {
            let (Some(u), Some(v)) = (u, v) else {
                continue;
            };
            a[(2 * k + r, 0)] = u.x * v.x;
            a[(2 * k + r, 1)] = u.y * v.y;
            b[2 * k + r] = -u.z * v.z;
        }
    }

    let svd = a.svd(true, true);
    let sv = &svd.singular_values;
    let (smax, smin) = (sv.max(), sv.min());
    if smax <= 0.0 || smin / smax < 1e-6 {
        debug!("focal initialisation degenerate (sv {smin:.3e}/{smax:.3e}), using {fallback}");
        return fallback_matrix;
    }

    let Ok(x) = svd.solve(&b, 1e-15) else {
        return fallback_matrix;
    };
    if !(x[0] > 0.0 && x[1] > 0.0) {
        debug!("focal initialisation gave non-positive 1/f^2, using {fallback}");
        return fallback_matrix;
    }

    let fx = (1.0 / x[0]).sqrt();
    let fy = (1.0 / x[1]).sqrt();
    if !(fx.is_finite() && fy.is_finite()) {
        return fallback_matrix;
    }
    debug!("initial focal lengths fx={fx:.2} fy={fy:.2}");
    CameraMatrix { fx, fy, cx, cy }
}

fn unit(v: &Vector3<f64>) -> Option<Vector3<f64>> {
    let n = v.norm();
    (n > 1e-12).then(|| v / n)
}
