use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibError {
    #[error("no views to calibrate from")]
    NoViews,
    #[error("view {index}: {count} correspondences, need at least 4")]
    TooFewPoints { index: usize, count: usize },
    #[error("view {index}: {objects} object points but {images} image points")]
    MismatchedView {
        index: usize,
        objects: usize,
        images: usize,
    },
    #[error("view {index}: calibration target is not planar (z = 0)")]
    NonPlanarTarget { index: usize },
    #[error("view {index}: homography estimation failed")]
    HomographyFailed { index: usize },
    #[error("view {index}: degenerate homography for pose extraction")]
    DegeneratePose { index: usize },
    #[error("image buffer has {actual} bytes, expected {expected}")]
    ImageBufferSize { expected: usize, actual: usize },
    #[error("solver failure: {0}")]
    SolverFailure(String),
}
