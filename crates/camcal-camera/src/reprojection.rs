//! Reprojection error statistics.

use crate::calibrate::PlanarView;
use crate::camera::Camera;
use crate::error::CalibError;
use crate::pose::Pose;
use nalgebra::{Point2, Point3};
use serde::Serialize;

/// Error of one view, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ViewError {
    /// `‖observed − projected‖₂ / n` with the norm over the stacked
    /// coordinate vector.
    pub l2_over_n: f64,
    /// Mean point distance.
    pub mean: f64,
    /// Largest point distance.
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReprojectionReport {
    pub per_view: Vec<ViewError>,
    /// Mean of `l2_over_n` over views.
    pub total_error: f64,
}

pub fn project_points(camera: &Camera, pose: &Pose, object: &[Point3<f64>]) -> Vec<Point2<f64>> {
    object.iter().map(|p| camera.project(pose, p)).collect()
}

/// Re-project every view with its solved pose and compare to the detections.
pub fn reprojection_report(
    camera: &Camera,
    views: &[PlanarView],
    poses: &[Pose],
) -> Result<ReprojectionReport, CalibError> {
    if views.is_empty() {
        return Err(CalibError::NoViews);
    }
    if views.len() != poses.len() {
        return Err(CalibError::SolverFailure(format!(
            "{} views but {} poses",
            views.len(),
            poses.len()
        )));
    }

    let mut per_view = Vec::with_capacity(views.len());
    for (index, (view, pose)) in views.iter().zip(poses).enumerate() {
        if view.is_empty() {
            return Err(CalibError::TooFewPoints { index, count: 0 });
        }
        let projected = project_points(camera, pose, &view.object_points);
        let mut sum_sq = 0.0;
        let mut sum = 0.0;
        let mut max = 0.0f64;
        for (p, q) in projected.iter().zip(&view.image_points) {
            let d = (p - q).norm();
            sum_sq += d * d;
            sum += d;
            max = max.max(d);
        }
        let n = view.len() as f64;
        per_view.push(ViewError {
            l2_over_n: sum_sq.sqrt() / n,
            mean: sum / n,
            max,
        });
    }

    let total_error = per_view.iter().map(|e| e.l2_over_n).sum::<f64>() / per_view.len() as f64;
    Ok(ReprojectionReport {
        per_view,
        total_error,
    })
}
