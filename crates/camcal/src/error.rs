use crate::archive::ArchiveError;
use camcal_camera::CalibError;
use camcal_chessboard::ParamsError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the calibration pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no jpeg images found in {}", .0.display())]
    NoInputImagesFound(PathBuf),

    #[error("checkerboard with {rows}x{cols} inner corners not found in any of {images} images")]
    NoPatternDetected { rows: u32, cols: u32, images: usize },

    #[error("cannot decode image {}: {source}", .path.display())]
    CorruptOrUnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write image {}: {source}", .path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("calibration failed: {0}")]
    SolverFailure(#[from] CalibError),

    #[error("undistortion failed: {0}")]
    Undistortion(#[source] CalibError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("invalid configuration {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Params(#[from] ParamsError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
