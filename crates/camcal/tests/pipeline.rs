mod common;

use approx::assert_relative_eq;
use camcal::preview::PREVIEW_DIR_NAME;
use camcal::{
    run, CalibrationArchive, CalibrationConfig, NoopObserver, PipelineError, RunOptions,
    ScanObserver, ARCHIVE_FILE_NAME,
};
use common::{ground_truth, init_logger, write_blank, write_dataset, HEIGHT, WIDTH};
use std::path::{Path, PathBuf};

fn seeded(seed: u64) -> RunOptions {
    RunOptions {
        previews: false,
        seed: Some(seed),
        undistort_with_optimal: false,
    }
}

#[derive(Default)]
struct Recorder {
    seen: Vec<(PathBuf, usize, usize)>,
    found: usize,
}

impl ScanObserver for Recorder {
    fn on_image(&mut self, path: &Path, index: usize, total: usize) {
        self.seen.push((path.to_path_buf(), index, total));
    }

    fn on_detection(
        &mut self,
        _path: &Path,
        _image: &image::DynamicImage,
        corners: Option<&[nalgebra::Point2<f32>]>,
    ) {
        if corners.is_some() {
            self.found += 1;
        }
    }
}

#[test]
fn calibrates_rendered_dataset() {
    init_logger();
    let dir = tempfile::tempdir().expect("temp dir");
    let written = write_dataset(dir.path());
    let gt = ground_truth();

    let mut recorder = Recorder::default();
    let result = run(dir.path(), &CalibrationConfig::default(), &seeded(3), &mut recorder)
        .expect("calibration run");

    assert_eq!(result.images, written);
    assert_eq!(recorder.seen.len(), written.len());
    assert_eq!(recorder.seen[0].1, 1);
    assert_eq!(recorder.seen[0].2, written.len());
    assert_eq!(recorder.found, written.len());
    assert_eq!(result.records.len(), written.len());

    let k = result.calibration.camera.matrix;
    assert_relative_eq!(k.fx, gt.matrix.fx, max_relative = 1e-2);
    assert_relative_eq!(k.fy, gt.matrix.fy, max_relative = 1e-2);
    assert!((k.cx - gt.matrix.cx).abs() < 5.0, "cx {}", k.cx);
    assert!((k.cy - gt.matrix.cy).abs() < 5.0, "cy {}", k.cy);
    let d = result.calibration.camera.distortion;
    assert!((d.k1 - gt.distortion.k1).abs() < 0.03, "k1 {}", d.k1);

    assert!(result.calibration.rms < 0.5, "rms {}", result.calibration.rms);
    assert!(
        result.reprojection.total_error < 0.1,
        "total error {}",
        result.reprojection.total_error
    );
    assert_eq!(result.reprojection.per_view.len(), written.len());

    assert_eq!(result.archive_path, dir.path().join(ARCHIVE_FILE_NAME));
    let archive = CalibrationArchive::read(&result.archive_path).expect("archive");
    assert_eq!(archive.mtx, k.to_matrix());
    assert_eq!(archive.dist, d.to_array());
    assert_eq!(archive.rvecs.len(), written.len());

    assert!(written.contains(&result.demo.path));
    assert!(!result.demo.used_optimal);
    assert_eq!(result.demo.undistorted.dimensions(), (WIDTH, HEIGHT));
    assert!(result.demo.preview.is_none());
    assert!(!dir.path().join(PREVIEW_DIR_NAME).exists());

    let summary = result.summary();
    assert_eq!(summary.intrinsic_parameters.width_px, WIDTH);
    assert_eq!(summary.intrinsic_parameters.height_px, HEIGHT);
}

#[test]
fn repeated_runs_are_identical() {
    init_logger();
    let dir = tempfile::tempdir().expect("temp dir");
    write_dataset(dir.path());
    let config = CalibrationConfig::default();

    let a = run(dir.path(), &config, &seeded(11), &mut NoopObserver).expect("first run");
    let b = run(dir.path(), &config, &seeded(11), &mut NoopObserver).expect("second run");
    assert_eq!(a.calibration.camera, b.calibration.camera);
    assert_eq!(a.demo.path, b.demo.path);
    assert_eq!(a.reprojection, b.reprojection);
}

#[test]
fn previews_are_written_when_enabled() {
    init_logger();
    let dir = tempfile::tempdir().expect("temp dir");
    let written = write_dataset(dir.path());
    let options = RunOptions {
        previews: true,
        seed: Some(1),
        undistort_with_optimal: true,
    };

    let result = run(dir.path(), &CalibrationConfig::default(), &options, &mut NoopObserver)
        .expect("calibration run");
    let preview_dir = dir.path().join(PREVIEW_DIR_NAME);
    for path in &written {
        let stem = path.file_stem().and_then(|s| s.to_str()).expect("stem");
        assert!(preview_dir.join(format!("{stem}_corners.png")).is_file());
    }
    let comparison = result.demo.preview.as_ref().expect("comparison preview");
    let (w, h) = image::image_dimensions(comparison).expect("png");
    assert_eq!((w, h), (2 * WIDTH, HEIGHT));
    assert!(result.demo.used_optimal);
    assert!(!result.demo.roi.is_empty());
}

#[test]
fn images_without_a_board_are_skipped() {
    init_logger();
    let dir = tempfile::tempdir().expect("temp dir");
    let written = write_dataset(dir.path());
    write_blank(dir.path(), "blank.jpg");

    let result = run(dir.path(), &CalibrationConfig::default(), &seeded(5), &mut NoopObserver)
        .expect("calibration run");
    assert_eq!(result.images.len(), written.len() + 1);
    assert_eq!(result.records.len(), written.len());
    assert!(result.records.iter().all(|r| !r.path.ends_with("blank.jpg")));
}

#[test]
fn no_detections_is_reported_before_solving() {
    init_logger();
    let dir = tempfile::tempdir().expect("temp dir");
    write_blank(dir.path(), "a.jpg");
    write_blank(dir.path(), "b.JPEG");

    let err = run(dir.path(), &CalibrationConfig::default(), &seeded(0), &mut NoopObserver)
        .expect_err("no board anywhere");
    assert!(matches!(
        err,
        PipelineError::NoPatternDetected {
            rows: 8,
            cols: 6,
            images: 2
        }
    ));
    assert!(!dir.path().join(ARCHIVE_FILE_NAME).exists());
}

#[test]
fn empty_directory_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = run(dir.path(), &CalibrationConfig::default(), &seeded(0), &mut NoopObserver)
        .expect_err("no images");
    assert!(matches!(err, PipelineError::NoInputImagesFound(_)));
    assert!(!dir.path().join(ARCHIVE_FILE_NAME).exists());
}
