//! Pinhole camera model with Brown-Conrady distortion and planar-target
//! calibration.
//!
//! - [`Camera`]: intrinsics ([`CameraMatrix`]) plus [`Distortion`]
//!   `(k1, k2, p1, p2, k3)`.
//! - [`calibrate_camera`]: homography initialisation followed by joint
//!   Levenberg-Marquardt refinement over intrinsics, distortion and poses.
//! - [`reprojection_report`]: per-view and total reprojection error.
//! - [`optimal_new_camera_matrix`] and [`UndistortMap`]: image undistortion.

mod calibrate;
mod camera;
mod distortion;
mod error;
mod init;
mod lm;
mod pose;
mod reprojection;
mod undistort;

pub use calibrate::{calibrate_camera, view_homography, Calibration, PlanarView, SolveOptions};
pub use camera::{Camera, CameraMatrix, ImageSize};
pub use distortion::Distortion;
pub use error::CalibError;
pub use init::initial_camera_matrix;
pub use lm::{levenberg_marquardt, LmOptions, NllsProblem, SolveReport, Termination};
pub use pose::{pose_from_homography, Pose};
pub use reprojection::{project_points, reprojection_report, ReprojectionReport, ViewError};
pub use undistort::{optimal_new_camera_matrix, Roi, UndistortMap};
