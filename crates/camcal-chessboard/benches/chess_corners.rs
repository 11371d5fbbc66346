use camcal_chessboard::{find_corners, ChessParams, ChessboardDetector, ChessboardParams};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Slightly rotated checkerboard filling a 640x480 frame.
fn board_image() -> image::GrayImage {
    let (s, c) = 0.1f32.sin_cos();
    image::GrayImage::from_fn(640, 480, |x, y| {
        let px = x as f32 - 320.0;
        let py = y as f32 - 240.0;
        let u = ((c * px + s * py) / 40.0 + 4.5).floor() as i32;
        let v = ((-s * px + c * py) / 40.0 + 3.5).floor() as i32;
        let dark = (0..9).contains(&u) && (0..7).contains(&v) && (u + v) % 2 == 0;
        image::Luma([if dark { 0 } else { 255 }])
    })
}

fn bench_chess(c: &mut Criterion) {
    let img = board_image();
    let params = ChessParams::default();

    c.bench_function("chess_corners_640x480", |b| {
        b.iter(|| find_corners(black_box(&img), &params))
    });

    let detector = match ChessboardDetector::new(ChessboardParams::default()) {
        Ok(d) => d,
        Err(e) => panic!("default params rejected: {e}"),
    };
    c.bench_function("detect_8x6_640x480", |b| {
        b.iter(|| detector.detect(black_box(&img)))
    });
}

criterion_group!(benches, bench_chess);
criterion_main!(benches);
