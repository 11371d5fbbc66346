//! Monocular camera calibration from a directory of checkerboard images.
//!
//! The pipeline runs five stages in order:
//! 1. [`collect_images`]: JPEG files in the input directory.
//! 2. [`extract_correspondences`]: checkerboard detection and sub-pixel
//!    refinement per image; misses are skipped.
//! 3. [`camera::calibrate_camera`]: intrinsics, distortion and per-image
//!    poses, saved to `calib_data.npz`.
//! 4. [`camera::reprojection_report`]: per-image and total reprojection error.
//! 5. Undistortion of a randomly chosen input image.
//!
//! ## Quickstart
//!
//! ```no_run
//! use camcal::{run, CalibrationConfig, NoopObserver, RunOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig::default();
//! let result = run(Path::new("images"), &config, &RunOptions::default(), &mut NoopObserver)?;
//! println!("fx = {}", result.calibration.camera.matrix.fx);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `camcal::core`: corner, image and homography primitives.
//! - `camcal::chessboard`: checkerboard detection and sub-pixel refinement.
//! - `camcal::camera`: camera model, calibration solver and undistortion.

pub use camcal_camera as camera;
pub use camcal_chessboard as chessboard;
pub use camcal_core as core;

mod archive;
mod config;
mod error;
mod extract;
mod inputs;
mod pipeline;
pub mod preview;
pub mod report;
pub mod synthetic;

pub use archive::{ArchiveError, CalibrationArchive, ARCHIVE_FILE_NAME};
pub use config::CalibrationConfig;
pub use error::PipelineError;
pub use extract::{
    detect_pattern, extract_correspondences, CorrespondenceRecord, NoopObserver, PatternGeometry,
    ScanObserver,
};
pub use inputs::collect_images;
pub use pipeline::{run, solve, CalibrationRun, RunOptions, UndistortionDemo};
pub use report::{ConsoleProgress, ParameterSummary};
