use crate::distortion::Distortion;
use crate::pose::Pose;
use nalgebra::{Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pinhole intrinsics with zero skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraMatrix {
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Normalized coordinates to pixels.
    #[inline]
    pub fn to_pixel(&self, n: &Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    /// Pixels to normalized coordinates.
    #[inline]
    pub fn to_normalized(&self, p: &Point2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

/// Intrinsics plus lens distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub matrix: CameraMatrix,
    pub distortion: Distortion,
}

impl Camera {
    pub fn new(matrix: CameraMatrix, distortion: Distortion) -> Self {
        Self { matrix, distortion }
    }

    /// Project a board point through `pose`. Points at or behind the
    /// camera centre project to non-finite coordinates.
    #[inline]
    pub fn project(&self, pose: &Pose, point: &Point3<f64>) -> Point2<f64> {
        let pc = pose.transform(point);
        let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
        self.matrix.to_pixel(&self.distortion.distort(&n))
    }

    /// Apply distortion to a normalized point and map it to pixels.
    #[inline]
    pub fn distort(&self, n: &Vector2<f64>) -> Point2<f64> {
        self.matrix.to_pixel(&self.distortion.distort(n))
    }

    /// Ideal normalized coordinates of a distorted pixel.
    #[inline]
    pub fn undistort_normalized(&self, p: &Point2<f64>) -> Vector2<f64> {
        self.distortion.undistort(&self.matrix.to_normalized(p))
    }
}
