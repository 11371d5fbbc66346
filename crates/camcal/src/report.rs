//! Console output of a calibration run.

use crate::extract::ScanObserver;
use crate::pipeline::CalibrationRun;
use camcal_camera::{Camera, ImageSize};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicParameters {
    pub fx: f64,
    pub fy: f64,
    pub height_px: u32,
    pub ppx: f64,
    pub ppy: f64,
    pub width_px: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistortionParameters {
    pub rk1: f64,
    pub rk2: f64,
    pub rk3: f64,
    pub tp1: f64,
    pub tp2: f64,
}

/// Camera parameters in the field order of the printed parameter block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub intrinsic_parameters: IntrinsicParameters,
    pub distortion_parameters: DistortionParameters,
}

impl ParameterSummary {
    /// `size` is the size of the image used for the undistortion demo.
    pub fn new(camera: &Camera, size: ImageSize) -> Self {
        let m = &camera.matrix;
        let d = &camera.distortion;
        Self {
            intrinsic_parameters: IntrinsicParameters {
                fx: m.fx,
                fy: m.fy,
                height_px: size.height,
                ppx: m.cx,
                ppy: m.cy,
                width_px: size.width,
            },
            distortion_parameters: DistortionParameters {
                rk1: d.k1,
                rk2: d.k2,
                rk3: d.k3,
                tp1: d.p1,
                tp2: d.p2,
            },
        }
    }
}

/// Shortest round-trip representation, always with a decimal point.
pub fn py_float(v: f64) -> String {
    let s = format!("{v}");
    if v.is_finite() && !s.contains(['.', 'e']) {
        format!("{s}.0")
    } else {
        s
    }
}

fn array_row(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| format!("{v:.8e}")).collect();
    format!("[{}]", items.join(" "))
}

fn column_vectors(vs: &[Vector3<f64>]) -> String {
    let items: Vec<String> = vs
        .iter()
        .map(|v| format!("[[{:.8e}] [{:.8e}] [{:.8e}]]", v.x, v.y, v.z))
        .collect();
    format!("({})", items.join(",\n "))
}

/// The post-solve dump: solver RMS, matrices, poses and image size.
pub fn format_calibration(run: &CalibrationRun) -> String {
    let calib = &run.calibration;
    let k = calib.camera.matrix.to_matrix();
    let rvecs: Vec<_> = calib.poses.iter().map(|p| p.rvec).collect();
    let tvecs: Vec<_> = calib.poses.iter().map(|p| p.tvec).collect();
    let rows: Vec<String> = (0..3)
        .map(|r| array_row(&[k[(r, 0)], k[(r, 1)], k[(r, 2)]]))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "ret {}", py_float(calib.rms));
    let _ = writeln!(out, "mtx [{}]", rows.join("\n "));
    let _ = writeln!(out, "dist [{}]", array_row(&calib.camera.distortion.to_array()));
    let _ = writeln!(out, "rvecs {}", column_vectors(&rvecs));
    let _ = writeln!(out, "tvecs {}", column_vectors(&tvecs));
    let _ = writeln!(
        out,
        "imageSize ({}, {})",
        calib.image_size.width, calib.image_size.height
    );
    out
}

pub fn format_total_error(total_error: f64) -> String {
    format!("Total error:  {}", py_float(total_error))
}

/// JSON-like parameter block with a fixed field order.
pub fn format_parameter_block(summary: &ParameterSummary) -> String {
    let i = &summary.intrinsic_parameters;
    let d = &summary.distortion_parameters;
    let mut out = String::from("\n");
    let _ = writeln!(out, "\"intrinsic_parameters\": {{");
    let _ = writeln!(out, "   \"fx\": {},", py_float(i.fx));
    let _ = writeln!(out, "   \"fy\": {},", py_float(i.fy));
    let _ = writeln!(out, "   \"height_px\": {},", i.height_px);
    let _ = writeln!(out, "   \"ppx\": {},", py_float(i.ppx));
    let _ = writeln!(out, "   \"ppy\": {},", py_float(i.ppy));
    let _ = writeln!(out, "   \"width_px\": {}", i.width_px);
    let _ = writeln!(out, " }},");
    let _ = writeln!(out, " \"distortion_parameters\": {{");
    let _ = writeln!(out, "   \"rk1\": {},", py_float(d.rk1));
    let _ = writeln!(out, "   \"rk2\": {},", py_float(d.rk2));
    let _ = writeln!(out, "   \"rk3\": {},", py_float(d.rk3));
    let _ = writeln!(out, "   \"tp1\": {},", py_float(d.tp1));
    let _ = writeln!(out, "   \"tp2\": {}", py_float(d.tp2));
    let _ = writeln!(out, " }},");
    out
}

/// Full console report of a finished run.
pub fn format_run(run: &CalibrationRun) -> String {
    let mut out = format_calibration(run);
    out.push_str(&format_total_error(run.reprojection.total_error));
    out.push('\n');
    out.push_str(&format_parameter_block(&run.summary()));
    out
}

/// Prints `Reading image: <path> (i/N)` for every scanned image.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleProgress;

pub fn progress_line(path: &Path, index: usize, total: usize) -> String {
    format!("Reading image: {} ({index}/{total})", path.display())
}

impl ScanObserver for ConsoleProgress {
    fn on_image(&mut self, path: &Path, index: usize, total: usize) {
        println!("{}", progress_line(path, index, total));
    }
}
