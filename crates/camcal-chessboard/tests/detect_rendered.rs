use camcal_chessboard::{
    gray_view, refine_corners, ChessboardDetector, ChessboardParams, PatternSize, SubPixParams,
};
use camcal_core::Homography;
use image::GrayImage;
use nalgebra::{Matrix3, Point2};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Render a `pattern` board through `h` (board units -> pixels) with
/// `n x n` supersampling. Squares span `[-1, rows] x [-1, cols]`, so the
/// inner corners sit at integer board coordinates.
fn render(h: &Homography, pattern: PatternSize, width: u32, height: u32, n: usize) -> GrayImage {
    let inv = h.inverse().expect("invertible homography");
    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0usize;
        for sy in 0..n {
            for sx in 0..n {
                let px = x as f64 + (sx as f64 + 0.5) / n as f64 - 0.5;
                let py = y as f64 + (sy as f64 + 0.5) / n as f64 - 0.5;
                let q = inv.apply(Point2::new(px, py));
                let inside = q.x >= -1.0
                    && q.x < pattern.rows as f64
                    && q.y >= -1.0
                    && q.y < pattern.cols as f64;
                let black = inside && (q.x.floor() as i64 + q.y.floor() as i64).rem_euclid(2) == 0;
                if !black {
                    acc += 255;
                }
            }
        }
        image::Luma([((acc + n * n / 2) / (n * n)) as u8])
    })
}

fn detect_and_refine(img: &GrayImage, params: ChessboardParams) -> Option<Vec<Point2<f32>>> {
    let detector = ChessboardDetector::new(params).expect("params");
    let det = detector.detect(img)?;
    let mut pts = det.positions();
    refine_corners(&gray_view(img), &mut pts, &SubPixParams::default());
    Some(pts)
}

fn assert_matches_truth(pts: &[Point2<f32>], h: &Homography, pattern: PatternSize, tol: f64) {
    assert_eq!(pts.len(), pattern.corner_count());
    let rows = pattern.rows as usize;
    let mut max_err = 0.0f64;
    for (k, p) in pts.iter().enumerate() {
        let truth = h.apply(Point2::new((k % rows) as f64, (k / rows) as f64));
        let err = ((p.x as f64 - truth.x).powi(2) + (p.y as f64 - truth.y).powi(2)).sqrt();
        max_err = max_err.max(err);
    }
    assert!(max_err < tol, "max corner error {max_err:.3} px");
}

#[test]
fn detects_perspective_board_with_subpixel_accuracy() {
    init_logger();
    let pattern = PatternSize::new(8, 6);
    let h = Homography::new(Matrix3::new(
        32.0, 4.0, 130.0, //
        -3.0, 30.0, 110.0, //
        1.5e-4, 2.0e-4, 1.0,
    ));
    let img = render(&h, pattern, 560, 420, 4);

    let pts = detect_and_refine(&img, ChessboardParams::with_pattern(pattern)).expect("board found");
    assert_matches_truth(&pts, &h, pattern, 0.5);
}

#[test]
fn board_rotated_half_turn_keeps_image_aligned_order() {
    init_logger();
    let pattern = PatternSize::new(8, 6);
    // Board x axis points left in the image.
    let h = Homography::new(Matrix3::new(
        -30.0, 0.0, 400.0, //
        0.0, -30.0, 300.0, //
        0.0, 0.0, 1.0,
    ));
    let img = render(&h, pattern, 480, 380, 4);

    let pts = detect_and_refine(&img, ChessboardParams::with_pattern(pattern)).expect("board found");
    // Same grid seen the other way round: corner (a, b) is board corner
    // (rows-1-a, cols-1-b).
    let flipped = Homography::new(
        h.to_matrix()
            * Matrix3::new(
                -1.0, 0.0, (pattern.rows - 1) as f64, //
                0.0, -1.0, (pattern.cols - 1) as f64, //
                0.0, 0.0, 1.0,
            ),
    );
    assert_matches_truth(&pts, &flipped, pattern, 0.5);
}

#[test]
fn large_image_is_detected_on_downsampled_copy() {
    init_logger();
    let pattern = PatternSize::new(8, 6);
    let h = Homography::new(Matrix3::new(
        110.0, 6.0, 320.0, //
        -5.0, 108.0, 260.0, //
        0.0, 0.0, 1.0,
    ));
    let img = render(&h, pattern, 1600, 1200, 2);

    let params = ChessboardParams {
        max_detection_dim: Some(800),
        ..ChessboardParams::with_pattern(pattern)
    };
    let pts = detect_and_refine(&img, params).expect("board found");
    assert_matches_truth(&pts, &h, pattern, 0.5);
}

#[test]
fn wrong_pattern_size_is_not_detected() {
    init_logger();
    let h = Homography::new(Matrix3::new(30.0, 0.0, 120.0, 0.0, 30.0, 100.0, 0.0, 0.0, 1.0));
    let img = render(&h, PatternSize::new(5, 4), 400, 320, 2);

    let params = ChessboardParams::with_pattern(PatternSize::new(8, 6));
    assert!(detect_and_refine(&img, params).is_none());
}

#[test]
fn blank_image_is_not_detected() {
    init_logger();
    let img = GrayImage::from_pixel(320, 240, image::Luma([180]));
    assert!(detect_and_refine(&img, ChessboardParams::default()).is_none());
}
