//! Preview images written in place of interactive windows.

use crate::error::PipelineError;
use crate::extract::ScanObserver;
use camcal_chessboard::PatternSize;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use log::{debug, warn};
use nalgebra::Point2;
use std::path::{Path, PathBuf};

pub const PREVIEW_DIR_NAME: &str = "calib_preview";

const ROW_COLORS: [Rgb<u8>; 7] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 200, 0]),
    Rgb([0, 200, 200]),
    Rgb([0, 0, 255]),
    Rgb([255, 0, 255]),
];

/// Draw a detected board: one colour per board row, circles at corners and
/// a polyline through them in canonical order.
pub fn draw_corners(img: &mut RgbImage, pattern: PatternSize, corners: &[Point2<f32>]) {
    let rows = pattern.rows.max(1) as usize;
    let radius = (img.width().max(img.height()) / 160).max(3) as i32;
    for (k, p) in corners.iter().enumerate() {
        let color = ROW_COLORS[(k / rows) % ROW_COLORS.len()];
        if let Some(next) = corners.get(k + 1) {
            draw_line_segment_mut(img, (p.x, p.y), (next.x, next.y), color);
        }
        draw_hollow_circle_mut(img, (p.x.round() as i32, p.y.round() as i32), radius, color);
    }
}

/// Place `left` and `right` next to each other on a black canvas.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let mut canvas = RgbImage::new(left.width() + right.width(), left.height().max(right.height()));
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, left.width() as i64, 0);
    canvas
}

/// Writes previews into `<dir>/calib_preview/`.
#[derive(Clone, Debug)]
pub struct PreviewWriter {
    dir: PathBuf,
    pattern: PatternSize,
}

impl PreviewWriter {
    pub fn new(images_dir: &Path, pattern: PatternSize) -> Result<Self, PipelineError> {
        let dir = images_dir.join(PREVIEW_DIR_NAME);
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        Ok(Self { dir, pattern })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The input image, with the board overlay when it was found.
    pub fn write_detection(
        &self,
        source: &Path,
        image: &DynamicImage,
        corners: Option<&[Point2<f32>]>,
    ) -> Result<PathBuf, PipelineError> {
        let mut rgb = image.to_rgb8();
        if let Some(corners) = corners {
            draw_corners(&mut rgb, self.pattern, corners);
        }
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        self.save(&rgb, &format!("{stem}_corners.png"))
    }

    pub fn write_comparison(
        &self,
        original: &RgbImage,
        undistorted: &RgbImage,
    ) -> Result<PathBuf, PipelineError> {
        self.save(&side_by_side(original, undistorted), "undistorted.png")
    }

    fn save(&self, img: &RgbImage, name: &str) -> Result<PathBuf, PipelineError> {
        let path = self.dir.join(name);
        img.save(&path)
            .map_err(|source| PipelineError::ImageWrite {
                path: path.clone(),
                source,
            })?;
        debug!("preview written to {}", path.display());
        Ok(path)
    }
}

impl ScanObserver for PreviewWriter {
    fn on_detection(&mut self, path: &Path, image: &DynamicImage, corners: Option<&[Point2<f32>]>) {
        if let Err(err) = self.write_detection(path, image, corners) {
            warn!("preview for {} not written: {err}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_by_side_stacks_horizontally() {
        let a = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let b = RgbImage::from_pixel(5, 2, Rgb([200, 100, 50]));
        let c = side_by_side(&a, &b);
        assert_eq!(c.dimensions(), (9, 3));
        assert_eq!(*c.get_pixel(3, 2), Rgb([10, 20, 30]));
        assert_eq!(*c.get_pixel(4, 0), Rgb([200, 100, 50]));
        assert_eq!(*c.get_pixel(8, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn overlay_colours_corners_by_row() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let pattern = PatternSize::new(2, 2);
        let corners = [
            Point2::new(20.0, 20.0),
            Point2::new(80.0, 20.0),
            Point2::new(20.0, 80.0),
            Point2::new(80.0, 80.0),
        ];
        draw_corners(&mut img, pattern, &corners);
        // Midpoint of the first row segment carries the first row colour.
        assert_eq!(*img.get_pixel(50, 20), ROW_COLORS[0]);
        assert_eq!(*img.get_pixel(20, 77), ROW_COLORS[1]);
        assert_eq!(*img.get_pixel(50, 90), Rgb([255, 255, 255]));
    }

    #[test]
    fn writer_creates_preview_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let writer = PreviewWriter::new(dir.path(), PatternSize::new(2, 2)).expect("writer");
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let path = writer
            .write_detection(Path::new("/data/view_01.jpg"), &img, None)
            .expect("write");
        assert_eq!(path, dir.path().join(PREVIEW_DIR_NAME).join("view_01_corners.png"));
        assert!(path.is_file());

        let cmp = writer
            .write_comparison(&RgbImage::new(4, 4), &RgbImage::new(4, 4))
            .expect("write");
        assert!(cmp.is_file());
    }
}
