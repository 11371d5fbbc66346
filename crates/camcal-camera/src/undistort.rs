//! Image undistortion: optimal new camera matrix and a remap table.

use crate::camera::{Camera, CameraMatrix, ImageSize};
use crate::error::CalibError;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

const RECT_SAMPLES: usize = 9;
const ROI_EPS: f64 = 1e-6;

/// Inner (all-valid) and outer (bounding) rectangles of the undistorted
/// image border, sampled on a 9x9 grid. Coordinates are normalized when
/// `target` is `None`, otherwise pixels of `target`.
fn undistorted_rectangles(
    camera: &Camera,
    size: ImageSize,
    target: Option<&CameraMatrix>,
) -> (Rect, Rect) {
    let n = RECT_SAMPLES;
    let (mut ix0, mut ix1, mut iy0, mut iy1) = (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    let sx = (size.width as f64 - 1.0) / (n - 1) as f64;
    let sy = (size.height as f64 - 1.0) / (n - 1) as f64;

    for i in 0..n {
        for j in 0..n {
            let pixel = Point2::new(j as f64 * sx, i as f64 * sy);
            let u = camera.undistort_normalized(&pixel);
            let p = match target {
                Some(k) => k.to_pixel(&u).coords,
                None => u,
            };
            ox0 = ox0.min(p.x);
            ox1 = ox1.max(p.x);
            oy0 = oy0.min(p.y);
            oy1 = oy1.max(p.y);
            if j == 0 {
                ix0 = ix0.max(p.x);
            }
            if j == n - 1 {
                ix1 = ix1.min(p.x);
            }
            if i == 0 {
                iy0 = iy0.max(p.y);
            }
            if i == n - 1 {
                iy1 = iy1.min(p.y);
            }
        }
    }

    (
        Rect {
            x: ix0,
            y: iy0,
            width: ix1 - ix0,
            height: iy1 - iy0,
        },
        Rect {
            x: ox0,
            y: oy0,
            width: ox1 - ox0,
            height: oy1 - oy0,
        },
    )
}

/// Camera matrix for the undistorted image.
///
/// `alpha = 0` keeps only valid pixels (no black border), `alpha = 1` keeps
/// every source pixel. The returned ROI is the all-valid rectangle in the
/// new image.
pub fn optimal_new_camera_matrix(
    camera: &Camera,
    size: ImageSize,
    alpha: f64,
    new_size: ImageSize,
) -> (CameraMatrix, Roi) {
    let alpha = alpha.clamp(0.0, 1.0);
    let (inner, outer) = undistorted_rectangles(camera, size, None);
    let w = new_size.width as f64 - 1.0;
    let h = new_size.height as f64 - 1.0;

    let fx0 = w / inner.width;
    let fy0 = h / inner.height;
    let fx1 = w / outer.width;
    let fy1 = h / outer.height;

    let matrix = CameraMatrix {
        fx: fx0 * (1.0 - alpha) + fx1 * alpha,
        fy: fy0 * (1.0 - alpha) + fy1 * alpha,
        cx: -fx0 * inner.x * (1.0 - alpha) - fx1 * outer.x * alpha,
        cy: -fy0 * inner.y * (1.0 - alpha) - fy1 * outer.y * alpha,
    };

    let (valid, _) = undistorted_rectangles(camera, size, Some(&matrix));
    let x0 = (valid.x - ROI_EPS).ceil().max(0.0);
    let y0 = (valid.y - ROI_EPS).ceil().max(0.0);
    let x1 = (x0 + (valid.width + ROI_EPS).floor()).min(new_size.width as f64);
    let y1 = (y0 + (valid.height + ROI_EPS).floor()).min(new_size.height as f64);
    let roi = if x1 > x0 && y1 > y0 {
        Roi {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    } else {
        Roi::default()
    };

    (matrix, roi)
}

/// Per-pixel source coordinates of the undistorted image.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    size: ImageSize,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortMap {
    /// Build the map for an image of `size` rendered with `new_matrix`.
    pub fn new(camera: &Camera, new_matrix: &CameraMatrix, size: ImageSize) -> Self {
        let n = size.width as usize * size.height as usize;
        let mut map_x = Vec::with_capacity(n);
        let mut map_y = Vec::with_capacity(n);
        for v in 0..size.height {
            for u in 0..size.width {
                let ideal = Vector2::new(
                    (u as f64 - new_matrix.cx) / new_matrix.fx,
                    (v as f64 - new_matrix.cy) / new_matrix.fy,
                );
                let src = camera.distort(&ideal);
                map_x.push(src.x as f32);
                map_y.push(src.y as f32);
            }
        }
        Self { size, map_x, map_y }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Bilinear remap of an interleaved 8-bit image; outside pixels are black.
    pub fn remap(&self, src: &[u8], channels: usize) -> Result<Vec<u8>, CalibError> {
        let w = self.size.width as usize;
        let h = self.size.height as usize;
        let expected = w * h * channels;
        if src.len() != expected || channels == 0 {
            return Err(CalibError::ImageBufferSize {
                expected,
                actual: src.len(),
            });
        }

        let mut out = vec![0u8; expected];
        let mut acc = vec![0f32; channels];
        for (k, (&x, &y)) in self.map_x.iter().zip(&self.map_y).enumerate() {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            let x0 = x.floor();
            let y0 = y.floor();
            let tx = x - x0;
            let ty = y - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            acc.fill(0.0);
            let mut any = false;
            for (dy, wy) in [(0, 1.0 - ty), (1, ty)] {
                for (dx, wx) in [(0, 1.0 - tx), (1, tx)] {
                    let (sx, sy) = (x0 + dx, y0 + dy);
                    if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                        continue;
                    }
                    any = true;
                    let base = (sy as usize * w + sx as usize) * channels;
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += wx * wy * src[base + c] as f32;
                    }
                }
            }
            if any {
                for (c, a) in acc.iter().enumerate() {
                    out[k * channels + c] = a.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        Ok(out)
    }
}
