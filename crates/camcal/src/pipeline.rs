//! The calibration procedure: collect, extract, solve, report, undistort.

use crate::archive::{CalibrationArchive, ARCHIVE_FILE_NAME};
use crate::config::CalibrationConfig;
use crate::error::PipelineError;
use crate::extract::{extract_correspondences, CorrespondenceRecord, ScanObserver};
use crate::inputs::collect_images;
use crate::preview::PreviewWriter;
use crate::report::ParameterSummary;
use camcal_camera::{
    calibrate_camera, optimal_new_camera_matrix, reprojection_report, CalibError, Calibration,
    CameraMatrix, ImageSize, PlanarView, ReprojectionReport, Roi, UndistortMap,
};
use image::{DynamicImage, RgbImage};
use log::info;
use nalgebra::Point2;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Write corner overlays and the undistortion comparison to
    /// `<dir>/calib_preview/`.
    pub previews: bool,
    /// Seed for the undistortion demo image choice.
    pub seed: Option<u64>,
    /// Undistort with the optimal new camera matrix instead of the
    /// calibrated one.
    pub undistort_with_optimal: bool,
}

/// Undistortion of one randomly chosen input image.
#[derive(Clone, Debug)]
pub struct UndistortionDemo {
    pub path: PathBuf,
    pub size: ImageSize,
    pub optimal_matrix: CameraMatrix,
    pub roi: Roi,
    pub used_optimal: bool,
    pub original: RgbImage,
    pub undistorted: RgbImage,
    /// Side-by-side preview, when previews are enabled.
    pub preview: Option<PathBuf>,
}

/// Everything a finished run produced.
#[derive(Clone, Debug)]
pub struct CalibrationRun {
    pub images: Vec<PathBuf>,
    pub records: Vec<CorrespondenceRecord>,
    pub calibration: Calibration,
    pub reprojection: ReprojectionReport,
    pub archive_path: PathBuf,
    pub demo: UndistortionDemo,
}

impl CalibrationRun {
    pub fn summary(&self) -> ParameterSummary {
        ParameterSummary::new(&self.calibration.camera, self.demo.size)
    }
}

struct StageObserver<'a> {
    inner: &'a mut dyn ScanObserver,
    previews: Option<PreviewWriter>,
}

impl ScanObserver for StageObserver<'_> {
    fn on_image(&mut self, path: &Path, index: usize, total: usize) {
        self.inner.on_image(path, index, total);
    }

    fn on_detection(&mut self, path: &Path, image: &DynamicImage, corners: Option<&[Point2<f32>]>) {
        self.inner.on_detection(path, image, corners);
        if let Some(previews) = self.previews.as_mut() {
            previews.on_detection(path, image, corners);
        }
    }
}

/// Solve from the correspondences. Needs at least one record.
pub fn solve(
    records: &[CorrespondenceRecord],
    config: &CalibrationConfig,
) -> Result<(Calibration, ReprojectionReport), PipelineError> {
    let Some(first) = records.first() else {
        return Err(CalibError::NoViews.into());
    };
    let views: Vec<PlanarView> = records.iter().map(CorrespondenceRecord::to_view).collect();
    let calibration = calibrate_camera(&views, first.image_size, &config.solve)?;
    let reprojection = reprojection_report(&calibration.camera, &views, &calibration.poses)?;
    Ok((calibration, reprojection))
}

fn undistort_rgb(map: &UndistortMap, src: &RgbImage) -> Result<RgbImage, PipelineError> {
    let size = map.size();
    let data = map.remap(src.as_raw(), 3).map_err(PipelineError::Undistortion)?;
    let actual = data.len();
    RgbImage::from_raw(size.width, size.height, data).ok_or(PipelineError::Undistortion(
        CalibError::ImageBufferSize {
            expected: size.width as usize * size.height as usize * 3,
            actual,
        },
    ))
}

fn undistortion_demo(
    path: &Path,
    calibration: &Calibration,
    config: &CalibrationConfig,
    use_optimal: bool,
) -> Result<UndistortionDemo, PipelineError> {
    let original = image::open(path)
        .map_err(|source| PipelineError::CorruptOrUnreadableImage {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let size = ImageSize::new(original.width(), original.height());
    let camera = &calibration.camera;
    let (optimal_matrix, roi) = optimal_new_camera_matrix(camera, size, config.optimal_alpha, size);
    let new_matrix = if use_optimal {
        optimal_matrix
    } else {
        camera.matrix
    };

    let map = UndistortMap::new(camera, &new_matrix, size);
    let undistorted = undistort_rgb(&map, &original)?;

    Ok(UndistortionDemo {
        path: path.to_path_buf(),
        size,
        optimal_matrix,
        roi,
        used_optimal: use_optimal,
        original,
        undistorted,
        preview: None,
    })
}

/// Run the full procedure on the JPEG images in `dir` and persist the
/// result to `<dir>/calib_data.npz`.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(config, options, observer)))]
pub fn run(
    dir: &Path,
    config: &CalibrationConfig,
    options: &RunOptions,
    observer: &mut dyn ScanObserver,
) -> Result<CalibrationRun, PipelineError> {
    let images = collect_images(dir)?;

    let previews = if options.previews {
        Some(PreviewWriter::new(dir, config.pattern())?)
    } else {
        None
    };
    let mut stage = StageObserver {
        inner: observer,
        previews,
    };
    let records = extract_correspondences(&images, config, &mut stage)?;
    if records.is_empty() {
        let pattern = config.pattern();
        return Err(PipelineError::NoPatternDetected {
            rows: pattern.rows,
            cols: pattern.cols,
            images: images.len(),
        });
    }

    let (calibration, reprojection) = solve(&records, config)?;
    let archive_path = dir.join(ARCHIVE_FILE_NAME);
    CalibrationArchive::from_calibration(&calibration).write(&archive_path)?;
    info!("calibration saved to {}", archive_path.display());

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let Some(demo_path) = images.choose(&mut rng) else {
        return Err(PipelineError::NoInputImagesFound(dir.to_path_buf()));
    };
    let mut demo = undistortion_demo(demo_path, &calibration, config, options.undistort_with_optimal)?;
    if let Some(previews) = stage.previews.as_ref() {
        demo.preview = Some(previews.write_comparison(&demo.original, &demo.undistorted)?);
    }

    Ok(CalibrationRun {
        images,
        records,
        calibration,
        reprojection,
        archive_path,
        demo,
    })
}
