#![allow(dead_code)]

use camcal::camera::{Camera, CameraMatrix, Distortion, Pose};
use camcal::chessboard::PatternSize;
use camcal::synthetic::render_board;
use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;
use nalgebra::Vector3;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ground_truth() -> Camera {
    Camera::new(
        CameraMatrix {
            fx: 700.0,
            fy: 690.0,
            cx: 322.0,
            cy: 238.0,
        },
        Distortion {
            k1: -0.08,
            k2: 0.03,
            p1: 0.0005,
            p2: -0.0005,
            k3: 0.0,
        },
    )
}

/// Board-centred poses: the board centre `(3.5, 2.5)` is placed at the
/// given camera-frame point.
pub fn poses() -> Vec<Pose> {
    let rvecs = [
        (0.30, 0.00, 0.05),
        (-0.30, 0.10, 0.00),
        (0.00, 0.32, -0.08),
        (0.10, -0.30, 0.10),
        (0.22, 0.22, 0.00),
        (-0.20, -0.22, 0.05),
    ];
    let centres = [
        (0.0, 0.0, 16.0),
        (0.8, -0.4, 16.5),
        (-0.6, 0.4, 17.0),
        (0.4, 0.6, 16.0),
        (-0.4, -0.6, 17.5),
        (0.6, 0.3, 16.5),
    ];
    rvecs
        .iter()
        .zip(&centres)
        .map(|(&(rx, ry, rz), &(x, y, z))| {
            let rvec = Vector3::new(rx, ry, rz);
            let r = Pose::new(rvec, Vector3::zeros()).rotation();
            Pose::new(rvec, Vector3::new(x, y, z) - r * Vector3::new(3.5, 2.5, 0.0))
        })
        .collect()
}

pub fn save_jpeg(img: &GrayImage, path: &Path) {
    let mut out = BufWriter::new(File::create(path).expect("create jpeg"));
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode_image(img)
        .expect("encode jpeg");
}

/// Render one JPEG per pose into `dir`; returns the written paths.
pub fn write_dataset(dir: &Path) -> Vec<PathBuf> {
    let camera = ground_truth();
    poses()
        .iter()
        .enumerate()
        .map(|(k, pose)| {
            let img = render_board(&camera, pose, PatternSize::new(8, 6), WIDTH, HEIGHT, 3);
            let path = dir.join(format!("view_{k:02}.jpg"));
            save_jpeg(&img, &path);
            path
        })
        .collect()
}

pub fn write_blank(dir: &Path, name: &str) -> PathBuf {
    let img = GrayImage::from_pixel(WIDTH, HEIGHT, image::Luma([180]));
    let path = dir.join(name);
    save_jpeg(&img, &path);
    path
}
