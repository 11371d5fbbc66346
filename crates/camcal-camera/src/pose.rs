//! Board pose relative to the camera.

use crate::camera::CameraMatrix;
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Board-to-camera transform `X_c = R(rvec) X_b + tvec`.
///
/// `rvec` is an axis-angle (Rodrigues) vector: its direction is the rotation
/// axis and its norm the angle in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn from_rotation(rotation: &Rotation3<f64>, tvec: Vector3<f64>) -> Self {
        Self::new(rotation.scaled_axis(), tvec)
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    #[inline]
    pub fn transform(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }
}

/// Decompose a board-plane homography (board `(X, Y)` to pixels) into the
/// pose of the board, given intrinsics.
///
/// The sign is chosen so the board lies in front of the camera (`t_z > 0`)
/// and the rotation is projected onto SO(3). `None` for degenerate input.
pub fn pose_from_homography(k: &CameraMatrix, h: &Matrix3<f64>) -> Option<Pose> {
    let k_inv = k.to_matrix().try_inverse()?;
    let m = k_inv * h;

    let h1 = m.column(0).into_owned();
    let h2 = m.column(1).into_owned();
    let h3 = m.column(2).into_owned();

    let norm1 = h1.norm();
    let norm2 = h2.norm();
    if norm1 <= 1e-12 || norm2 <= 1e-12 {
        return None;
    }
    let mut lambda = 2.0 / (norm1 + norm2);
    if h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * h1;
    let r2 = lambda * h2;
    let t = lambda * h3;
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return None;
    }

    let r_mat = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r_mat.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rotation = Rotation3::from_matrix_unchecked(r_orth);
    let pose = Pose::from_rotation(&rotation, t);
    pose.rvec.iter().chain(pose.tvec.iter()).all(|v| v.is_finite()).then_some(pose)
}
