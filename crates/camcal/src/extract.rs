//! Corner extraction: checkerboard detection and sub-pixel refinement per
//! image, collected into ordered 2D-3D correspondences.

use crate::config::CalibrationConfig;
use crate::error::PipelineError;
use camcal_camera::{ImageSize, PlanarView};
use camcal_chessboard::{
    gray_view, refine_corners, ChessboardDetector, ChessboardParams, ParamsError, PatternSize,
    SubPixParams,
};
use image::DynamicImage;
use log::{debug, info, warn};
use nalgebra::{Point2, Point3};
use std::path::{Path, PathBuf};
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Board object points: `(a, b, 0) * square_size` for `a < rows`,
/// `b < cols`, with `a` varying fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternGeometry {
    pattern: PatternSize,
    square_size: f64,
    points: Vec<Point3<f64>>,
}

impl PatternGeometry {
    pub fn new(pattern: PatternSize) -> Self {
        Self::with_square_size(pattern, 1.0)
    }

    pub fn with_square_size(pattern: PatternSize, square_size: f64) -> Self {
        let points = (0..pattern.cols)
            .flat_map(|b| {
                (0..pattern.rows)
                    .map(move |a| Point3::new(a as f64 * square_size, b as f64 * square_size, 0.0))
            })
            .collect();
        Self {
            pattern,
            square_size,
            points,
        }
    }

    pub fn pattern(&self) -> PatternSize {
        self.pattern
    }

    pub fn square_size(&self) -> f64 {
        self.square_size
    }

    pub fn object_points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

/// Correspondences contributed by one image.
#[derive(Clone, Debug)]
pub struct CorrespondenceRecord {
    pub path: PathBuf,
    pub image_size: ImageSize,
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

impl CorrespondenceRecord {
    pub fn to_view(&self) -> PlanarView {
        PlanarView::new(self.object_points.clone(), self.image_points.clone())
    }
}

/// Progress hooks for the scan over input images.
pub trait ScanObserver {
    /// Called before image `index` (1-based) of `total` is decoded.
    fn on_image(&mut self, _path: &Path, _index: usize, _total: usize) {}

    /// Called after detection; `corners` is `None` when the board was not found.
    fn on_detection(&mut self, _path: &Path, _image: &DynamicImage, _corners: Option<&[Point2<f32>]>) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

fn detect_with(
    detector: &ChessboardDetector,
    gray: &image::GrayImage,
    subpix: &SubPixParams,
) -> Option<Vec<Point2<f32>>> {
    let detection = detector.detect(gray)?;
    let mut corners = detection.positions();
    refine_corners(&gray_view(gray), &mut corners, subpix);
    Some(corners)
}

/// Locate the full checkerboard and refine its corners to sub-pixel
/// accuracy. `Ok(None)` when the board is not found.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(gray, params, subpix), fields(width = gray.width(), height = gray.height()))
)]
pub fn detect_pattern(
    gray: &image::GrayImage,
    params: &ChessboardParams,
    subpix: &SubPixParams,
) -> Result<Option<Vec<Point2<f32>>>, ParamsError> {
    let detector = ChessboardDetector::new(params.clone())?;
    Ok(detect_with(&detector, gray, subpix))
}

/// Decode and scan `paths` in order. Misses are skipped; so are images whose
/// size differs from the first image with a detection.
pub fn extract_correspondences(
    paths: &[PathBuf],
    config: &CalibrationConfig,
    observer: &mut dyn ScanObserver,
) -> Result<Vec<CorrespondenceRecord>, PipelineError> {
    let detector = ChessboardDetector::new(config.chessboard.clone())?;
    let geometry = PatternGeometry::with_square_size(config.pattern(), config.square_size);
    let mut records: Vec<CorrespondenceRecord> = Vec::new();

    for (k, path) in paths.iter().enumerate() {
        observer.on_image(path, k + 1, paths.len());
        let image = image::open(path).map_err(|source| PipelineError::CorruptOrUnreadableImage {
            path: path.clone(),
            source,
        })?;
        let gray = image.to_luma8();
        let size = ImageSize::new(gray.width(), gray.height());

        let corners = detect_with(&detector, &gray, &config.subpix);
        observer.on_detection(path, &image, corners.as_deref());

        let Some(corners) = corners else {
            debug!("{}: board not found", path.display());
            continue;
        };
        if let Some(first) = records.first() {
            if first.image_size != size {
                warn!(
                    "{}: size {}x{} differs from {}x{}, skipped",
                    path.display(),
                    size.width,
                    size.height,
                    first.image_size.width,
                    first.image_size.height
                );
                continue;
            }
        }

        records.push(CorrespondenceRecord {
            path: path.clone(),
            image_size: size,
            object_points: geometry.object_points().to_vec(),
            image_points: corners
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect(),
        });
    }

    info!("board found in {} of {} images", records.len(), paths.len());
    Ok(records)
}
