//! Sub-pixel corner refinement.
//!
//! At the true corner `q`, every image gradient `g(p)` inside the window is
//! orthogonal to `p − q` (flat regions have no gradient, edges have their
//! gradient orthogonal to the edge through `q`). Each iteration solves the
//! weighted normal equations `Σ g gᵀ · q = Σ g gᵀ · p` on a patch resampled
//! around the current estimate.

use crate::params::SubPixParams;
use camcal_core::{sample_bilinear, GrayImageView};
use log::trace;
use nalgebra::Point2;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Bilinear sample with the coordinates clamped to the image.
#[inline]
fn sample_clamped(view: &GrayImageView<'_>, x: f64, y: f64) -> f64 {
    let xmax = view.width.saturating_sub(1) as f64;
    let ymax = view.height.saturating_sub(1) as f64;
    sample_bilinear(view, x.clamp(0.0, xmax) as f32, y.clamp(0.0, ymax) as f32) as f64
}

fn gaussian_mask(win: usize) -> Vec<f64> {
    let coeff = 1.0 / (win * win) as f64;
    let side: Vec<f64> = (0..2 * win + 1)
        .map(|k| {
            let d = k as f64 - win as f64;
            (-d * d * coeff).exp()
        })
        .collect();
    side.iter()
        .flat_map(|&my| side.iter().map(move |&mx| my * mx))
        .collect()
}

/// Refine a single corner. Returns the initial point if the iteration
/// drifts farther than the window half-size.
pub fn refine_corner(view: &GrayImageView<'_>, initial: Point2<f32>, params: &SubPixParams) -> Point2<f32> {
    let win = params.half_window.max(1) as usize;
    let side = 2 * win + 1;
    let patch_side = side + 2;
    let mask = gaussian_mask(win);
    let eps2 = (params.epsilon as f64).powi(2);

    let start = (initial.x as f64, initial.y as f64);
    let (mut cx, mut cy) = start;
    let mut patch = vec![0.0f64; patch_side * patch_side];

    for iter in 0..params.max_iters.max(1) {
        // Patch centred on the current estimate, one pixel of margin for
        // the central differences.
        let half = (win + 1) as f64;
        for r in 0..patch_side {
            for c in 0..patch_side {
                patch[r * patch_side + c] =
                    sample_clamped(view, cx + c as f64 - half, cy + r as f64 - half);
            }
        }

        let (mut a, mut b, mut c, mut bb1, mut bb2) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for i in 0..side {
            let py = i as f64 - win as f64;
            for j in 0..side {
                let px = j as f64 - win as f64;
                let m = mask[i * side + j];
                let tgx = patch[(i + 1) * patch_side + j + 2] - patch[(i + 1) * patch_side + j];
                let tgy = patch[(i + 2) * patch_side + j + 1] - patch[i * patch_side + j + 1];
                let gxx = tgx * tgx * m;
                let gxy = tgx * tgy * m;
                let gyy = tgy * tgy * m;
                a += gxx;
                b += gxy;
                c += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }

        let det = a * c - b * b;
        if det.abs() <= f64::EPSILON * f64::EPSILON {
            break;
        }
        let scale = 1.0 / det;
        let nx = cx + c * scale * bb1 - b * scale * bb2;
        let ny = cy - b * scale * bb1 + a * scale * bb2;
        let err = (nx - cx).powi(2) + (ny - cy).powi(2);
        cx = nx;
        cy = ny;

        if cx < 0.0 || cy < 0.0 || cx >= view.width as f64 || cy >= view.height as f64 {
            break;
        }
        if err <= eps2 {
            trace!("subpix converged after {} iterations", iter + 1);
            break;
        }
    }

    if (cx - start.0).abs() > win as f64 || (cy - start.1).abs() > win as f64 || !cx.is_finite() || !cy.is_finite() {
        return initial;
    }
    Point2::new(cx as f32, cy as f32)
}

/// Refine all `corners` in place.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(view, corners, params), fields(n = corners.len()))
)]
pub fn refine_corners(view: &GrayImageView<'_>, corners: &mut [Point2<f32>], params: &SubPixParams) {
    for p in corners.iter_mut() {
        *p = refine_corner(view, *p, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::GrayImage;

    /// X-junction at (cx, cy), rendered with 8x8 supersampling.
    fn junction(size: usize, cx: f32, cy: f32, angle: f32) -> GrayImage {
        let (s, c) = angle.sin_cos();
        let n = 8;
        let mut img = GrayImage::filled(size, size, 0);
        for y in 0..size {
            for x in 0..size {
                let mut acc = 0u32;
                for sy in 0..n {
                    for sx in 0..n {
                        let px = x as f32 + (sx as f32 + 0.5) / n as f32 - 0.5 - cx;
                        let py = y as f32 + (sy as f32 + 0.5) / n as f32 - 0.5 - cy;
                        let u = c * px + s * py;
                        let v = -s * px + c * py;
                        if u * v > 0.0 {
                            acc += 1;
                        }
                    }
                }
                img.data[y * size + x] = (acc * 255 / (n * n) as u32) as u8;
            }
        }
        img
    }

    #[test]
    fn converges_to_true_junction() {
        let truth = (20.3f32, 19.7f32);
        let img = junction(41, truth.0, truth.1, 0.3);
        let refined = refine_corner(&img.view(), Point2::new(21.0, 19.0), &SubPixParams::default());
        assert!((refined.x - truth.0).abs() < 0.05, "x {}", refined.x);
        assert!((refined.y - truth.1).abs() < 0.05, "y {}", refined.y);
    }

    #[test]
    fn flat_patch_keeps_initial_point() {
        let img = GrayImage::filled(32, 32, 90);
        let p = Point2::new(16.0, 16.0);
        assert_eq!(refine_corner(&img.view(), p, &SubPixParams::default()), p);
    }

    #[test]
    fn mask_is_unit_at_centre() {
        let m = gaussian_mask(5);
        assert_eq!(m.len(), 121);
        assert!((m[60] - 1.0).abs() < 1e-12);
        assert!((m[0] - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn refine_corners_updates_every_point() {
        let img = junction(41, 20.0, 20.0, 0.0);
        let mut pts = [Point2::new(21.0, 21.0), Point2::new(19.2, 20.6)];
        refine_corners(&img.view(), &mut pts, &SubPixParams::default());
        for p in pts {
            assert!((p.x - 20.0).abs() < 0.05 && (p.y - 20.0).abs() < 0.05, "{p:?}");
        }
    }
}
