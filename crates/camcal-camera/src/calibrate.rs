//! Planar-target camera calibration.
//!
//! 1. Per-view DLT homography from board `(X, Y)` to pixels.
//! 2. Closed-form intrinsics with the principal point at the image centre.
//! 3. Per-view pose from homography.
//! 4. Joint Levenberg-Marquardt over
//!    `[fx fy cx cy k1 k2 p1 p2 k3 | rvec tvec] x N` minimising pixel
//!    reprojection error.

use crate::camera::{Camera, CameraMatrix, ImageSize};
use crate::distortion::Distortion;
use crate::error::CalibError;
use crate::init::initial_camera_matrix;
use crate::lm::{levenberg_marquardt, LmOptions, NllsProblem, SolveReport};
use crate::pose::{pose_from_homography, Pose};
use camcal_core::estimate_homography;
use log::{debug, info};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
#[cfg(feature = "tracing")]
use tracing::instrument;

/// 2D-3D correspondences of one image. Object points lie on `z = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarView {
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

impl PlanarView {
    pub fn new(object_points: Vec<Point3<f64>>, image_points: Vec<Point2<f64>>) -> Self {
        Self {
            object_points,
            image_points,
        }
    }

    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    pub lm: LmOptions,
    /// Keep the principal point at the image centre.
    pub fix_principal_point: bool,
    /// Hold `p1 = p2 = 0`.
    pub zero_tangential: bool,
    /// Hold `k3 = 0`.
    pub fix_k3: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            lm: LmOptions::default(),
            fix_principal_point: false,
            zero_tangential: false,
            fix_k3: false,
        }
    }
}

/// Solved camera and per-view poses.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub camera: Camera,
    pub poses: Vec<Pose>,
    /// `sqrt(Σ‖r‖² / #points)` over all views, in pixels.
    pub rms: f64,
    pub image_size: ImageSize,
    pub report: SolveReport,
}

const N_INTRINSICS: usize = 9;
const N_POSE: usize = 6;

struct CalibrationProblem<'a> {
    views: &'a [PlanarView],
    /// First point index of each view in the stacked residual vector.
    offsets: Vec<usize>,
    total_points: usize,
    /// Full parameter vector; fixed entries keep these values.
    base: DVector<f64>,
    /// Indices of free parameters in the full vector.
    free: Vec<usize>,
}

impl<'a> CalibrationProblem<'a> {
    fn new(views: &'a [PlanarView], base: DVector<f64>, opts: &SolveOptions) -> Self {
        let mut offsets = Vec::with_capacity(views.len());
        let mut total_points = 0;
        for v in views {
            offsets.push(total_points);
            total_points += v.len();
        }

        let fixed_intrinsic = |k: usize| match k {
            2 | 3 => opts.fix_principal_point,
            6 | 7 => opts.zero_tangential,
            8 => opts.fix_k3,
            _ => false,
        };
        let free = (0..base.len())
            .filter(|&k| k >= N_INTRINSICS || !fixed_intrinsic(k))
            .collect();

        Self {
            views,
            offsets,
            total_points,
            base,
            free,
        }
    }

    fn expand(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut full = self.base.clone();
        for (k, &idx) in self.free.iter().enumerate() {
            full[idx] = x[k];
        }
        full
    }

    fn reduce(&self, full: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&idx| full[idx]))
    }

    fn write_view_residuals(&self, full: &DVector<f64>, view: usize, out: &mut [f64]) {
        let camera = camera_from_params(full);
        let pose = pose_from_params(full, view);
        let v = &self.views[view];
        for (k, (obj, img)) in v.object_points.iter().zip(&v.image_points).enumerate() {
            let p = camera.project(&pose, obj);
            out[2 * k] = p.x - img.x;
            out[2 * k + 1] = p.y - img.y;
        }
    }

    fn view_rows(&self, view: usize) -> std::ops::Range<usize> {
        let start = 2 * self.offsets[view];
        start..start + 2 * self.views[view].len()
    }

    fn full_residuals(&self, full: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(2 * self.total_points);
        for view in 0..self.views.len() {
            let rows = self.view_rows(view);
            self.write_view_residuals(full, view, &mut r.as_mut_slice()[rows]);
        }
        r
    }
}

impl NllsProblem for CalibrationProblem<'_> {
    fn num_params(&self) -> usize {
        self.free.len()
    }

    fn num_residuals(&self) -> usize {
        2 * self.total_points
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        self.full_residuals(&self.expand(x))
    }

    /// Central differences. Pose columns only touch their own view's rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let full = self.expand(x);
        let mut j = DMatrix::zeros(2 * self.total_points, self.free.len());

        for (col, &idx) in self.free.iter().enumerate() {
            let h = 1e-6 * full[idx].abs().max(1.0);
            let mut plus = full.clone();
            let mut minus = full.clone();
            plus[idx] += h;
            minus[idx] -= h;
            let inv = 1.0 / (2.0 * h);

            if idx < N_INTRINSICS {
                let rp = self.full_residuals(&plus);
                let rm = self.full_residuals(&minus);
                j.set_column(col, &((rp - rm) * inv));
            } else {
                let view = (idx - N_INTRINSICS) / N_POSE;
                let rows = self.view_rows(view);
                let n = rows.len();
                let mut rp = vec![0.0; n];
                let mut rm = vec![0.0; n];
                self.write_view_residuals(&plus, view, &mut rp);
                self.write_view_residuals(&minus, view, &mut rm);
                for (k, row) in rows.enumerate() {
                    j[(row, col)] = (rp[k] - rm[k]) * inv;
                }
            }
        }
        j
    }
}

fn camera_from_params(full: &DVector<f64>) -> Camera {
    Camera::new(
        CameraMatrix {
            fx: full[0],
            fy: full[1],
            cx: full[2],
            cy: full[3],
        },
        Distortion::from_array([full[4], full[5], full[6], full[7], full[8]]),
    )
}

fn pose_from_params(full: &DVector<f64>, view: usize) -> Pose {
    let o = N_INTRINSICS + N_POSE * view;
    Pose::new(
        Vector3::new(full[o], full[o + 1], full[o + 2]),
        Vector3::new(full[o + 3], full[o + 4], full[o + 5]),
    )
}

fn pack_params(camera: &Camera, poses: &[Pose]) -> DVector<f64> {
    let m = &camera.matrix;
    let mut full = DVector::zeros(N_INTRINSICS + N_POSE * poses.len());
    full.as_mut_slice()[..4].copy_from_slice(&[m.fx, m.fy, m.cx, m.cy]);
    full.as_mut_slice()[4..N_INTRINSICS].copy_from_slice(&camera.distortion.to_array());
    for (v, pose) in poses.iter().enumerate() {
        let o = N_INTRINSICS + N_POSE * v;
        full.as_mut_slice()[o..o + 3].copy_from_slice(pose.rvec.as_slice());
        full.as_mut_slice()[o + 3..o + 6].copy_from_slice(pose.tvec.as_slice());
    }
    full
}

fn validate_views(views: &[PlanarView]) -> Result<(), CalibError> {
    if views.is_empty() {
        return Err(CalibError::NoViews);
    }
    for (index, v) in views.iter().enumerate() {
        if v.object_points.len() != v.image_points.len() {
            return Err(CalibError::MismatchedView {
                index,
                objects: v.object_points.len(),
                images: v.image_points.len(),
            });
        }
        if v.len() < 4 {
            return Err(CalibError::TooFewPoints {
                index,
                count: v.len(),
            });
        }
        if v.object_points.iter().any(|p| p.z.abs() > 1e-9) {
            return Err(CalibError::NonPlanarTarget { index });
        }
    }
    Ok(())
}

/// Board-to-image homography of one view.
pub fn view_homography(view: &PlanarView) -> Option<Matrix3<f64>> {
    let src: Vec<Point2<f64>> = view
        .object_points
        .iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect();
    estimate_homography(&src, &view.image_points).map(|h| h.to_matrix())
}

/// Calibrate intrinsics, distortion and per-view poses from planar views.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, opts), fields(views = views.len()))
)]
pub fn calibrate_camera(
    views: &[PlanarView],
    image_size: ImageSize,
    opts: &SolveOptions,
) -> Result<Calibration, CalibError> {
    validate_views(views)?;

    let homographies = views
        .iter()
        .enumerate()
        .map(|(index, v)| view_homography(v).ok_or(CalibError::HomographyFailed { index }))
        .collect::<Result<Vec<_>, _>>()?;

    let k0 = initial_camera_matrix(&homographies, image_size);
    debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        k0.fx, k0.fy, k0.cx, k0.cy
    );

    let poses0 = homographies
        .iter()
        .enumerate()
        .map(|(index, h)| pose_from_homography(&k0, h).ok_or(CalibError::DegeneratePose { index }))
        .collect::<Result<Vec<_>, _>>()?;

    let camera0 = Camera::new(k0, Distortion::default());
    let problem = CalibrationProblem::new(views, pack_params(&camera0, &poses0), opts);
    if problem.num_residuals() < problem.num_params() {
        return Err(CalibError::SolverFailure(format!(
            "{} residuals for {} unknowns",
            problem.num_residuals(),
            problem.num_params()
        )));
    }

    let x0 = problem.reduce(&problem.base);
    let (x, report) = levenberg_marquardt(&problem, x0, &opts.lm)?;
    let full = problem.expand(&x);

    let camera = camera_from_params(&full);
    let poses = (0..views.len()).map(|v| pose_from_params(&full, v)).collect();
    let rms = (2.0 * report.final_cost / problem.total_points as f64).sqrt();

    if !(camera.matrix.fx > 0.0 && camera.matrix.fy > 0.0) {
        return Err(CalibError::SolverFailure(format!(
            "non-positive focal length ({:.3}, {:.3})",
            camera.matrix.fx, camera.matrix.fy
        )));
    }
    info!(
        "calibrated {} views: rms {:.4} px after {} evaluations",
        views.len(),
        rms,
        report.evaluations
    );

    Ok(Calibration {
        camera,
        poses,
        rms,
        image_size,
        report,
    })
}
