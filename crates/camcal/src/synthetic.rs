//! Ray-traced checkerboard images for tests and demos.

use camcal_camera::{Camera, Pose};
use camcal_chessboard::PatternSize;
use image::{GrayImage, Luma};
use nalgebra::{Point2, Vector3};

const DARK: u32 = 20;
const LIGHT: u32 = 235;

/// Render a checkerboard with `pattern` inner corners, unit squares, seen
/// by `camera` from `pose`, on a light background. The squares cover
/// `[-1, rows] x [-1, cols]`, so inner corner `(a, b)` is object point
/// `(a, b, 0)`. Each pixel averages `supersample²` rays.
pub fn render_board(
    camera: &Camera,
    pose: &Pose,
    pattern: PatternSize,
    width: u32,
    height: u32,
    supersample: u32,
) -> GrayImage {
    let n = supersample.max(1);
    let r_inv = pose.rotation().inverse();
    let origin = r_inv * -pose.tvec;
    let (rows, cols) = (pattern.rows as f64, pattern.cols as f64);

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0u32;
        for sy in 0..n {
            for sx in 0..n {
                let px = x as f64 + (sx as f64 + 0.5) / n as f64 - 0.5;
                let py = y as f64 + (sy as f64 + 0.5) / n as f64 - 0.5;
                let ray = camera.undistort_normalized(&Point2::new(px, py));
                let dir = r_inv * Vector3::new(ray.x, ray.y, 1.0);
                acc += if dir.z.abs() < 1e-12 {
                    LIGHT
                } else {
                    let s = -origin.z / dir.z;
                    let q = origin + dir * s;
                    let inside = s > 0.0 && q.x >= -1.0 && q.x < rows && q.y >= -1.0 && q.y < cols;
                    let dark = inside && (q.x.floor() as i64 + q.y.floor() as i64).rem_euclid(2) == 0;
                    if dark {
                        DARK
                    } else {
                        LIGHT
                    }
                };
            }
        }
        Luma([((acc + n * n / 2) / (n * n)) as u8])
    })
}
