//! `calib_data.npz`: a zip of NPY v1.0 arrays, readable with `numpy.load`.

use camcal_camera::{Calibration, Camera, CameraMatrix, Distortion, Pose};
use nalgebra::{Matrix3, Vector3};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ARCHIVE_FILE_NAME: &str = "calib_data.npz";

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("array '{name}': {reason}")]
    Npy { name: String, reason: String },
    #[error("array '{name}' has shape {actual:?}, expected {expected}")]
    Shape {
        name: String,
        expected: String,
        actual: Vec<usize>,
    },
}

/// The four persisted arrays: `mtx` (3,3), `dist` (1,5), `rvecs` (N,3,1),
/// `tvecs` (N,3,1).
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationArchive {
    pub mtx: Matrix3<f64>,
    pub dist: [f64; 5],
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
}

impl CalibrationArchive {
    pub fn from_calibration(calib: &Calibration) -> Self {
        Self {
            mtx: calib.camera.matrix.to_matrix(),
            dist: calib.camera.distortion.to_array(),
            rvecs: calib.poses.iter().map(|p| p.rvec).collect(),
            tvecs: calib.poses.iter().map(|p| p.tvec).collect(),
        }
    }

    pub fn camera(&self) -> Camera {
        Camera::new(
            CameraMatrix {
                fx: self.mtx[(0, 0)],
                fy: self.mtx[(1, 1)],
                cx: self.mtx[(0, 2)],
                cy: self.mtx[(1, 2)],
            },
            Distortion::from_array(self.dist),
        )
    }

    pub fn poses(&self) -> Vec<Pose> {
        self.rvecs
            .iter()
            .zip(&self.tvecs)
            .map(|(r, t)| Pose::new(*r, *t))
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<(), ArchiveError> {
        let file = BufWriter::new(File::create(path)?);
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mtx: Vec<f64> = (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .map(|idx| self.mtx[idx])
            .collect();
        let n = self.rvecs.len();
        let entries = [
            ("mtx", vec![3, 3], mtx),
            ("dist", vec![1, 5], self.dist.to_vec()),
            ("rvecs", vec![n, 3, 1], flatten(&self.rvecs)),
            ("tvecs", vec![n, 3, 1], flatten(&self.tvecs)),
        ];
        for (name, shape, data) in entries {
            zip.start_file(format!("{name}.npy"), options)?;
            zip.write_all(&encode_npy(&shape, &data))?;
        }
        zip.finish()?.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, ArchiveError> {
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let mut load = |name: &str| -> Result<(Vec<usize>, Vec<f64>), ArchiveError> {
            let mut buf = Vec::new();
            zip.by_name(&format!("{name}.npy"))?.read_to_end(&mut buf)?;
            decode_npy(name, &buf)
        };

        let (shape, mtx) = load("mtx")?;
        expect_shape("mtx", &shape, &[3, 3])?;
        let (shape, dist) = load("dist")?;
        if shape.iter().product::<usize>() != 5 {
            return Err(shape_error("dist", "(1, 5)", shape));
        }
        let (rshape, rvecs) = load("rvecs")?;
        let (tshape, tvecs) = load("tvecs")?;
        let n = rshape.first().copied().unwrap_or(0);
        expect_shape("rvecs", &rshape, &[n, 3, 1])?;
        expect_shape("tvecs", &tshape, &[n, 3, 1])?;

        Ok(Self {
            mtx: Matrix3::from_row_slice(&mtx),
            dist: [dist[0], dist[1], dist[2], dist[3], dist[4]],
            rvecs: rvecs.chunks_exact(3).map(Vector3::from_column_slice).collect(),
            tvecs: tvecs.chunks_exact(3).map(Vector3::from_column_slice).collect(),
        })
    }
}

fn flatten(vs: &[Vector3<f64>]) -> Vec<f64> {
    vs.iter().flat_map(|v| [v.x, v.y, v.z]).collect()
}

fn shape_error(name: &str, expected: &str, actual: Vec<usize>) -> ArchiveError {
    ArchiveError::Shape {
        name: name.into(),
        expected: expected.into(),
        actual,
    }
}

fn expect_shape(name: &str, shape: &[usize], expected: &[usize]) -> Result<(), ArchiveError> {
    if shape == expected {
        Ok(())
    } else {
        Err(shape_error(name, &format!("{expected:?}"), shape.to_vec()))
    }
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({n},)"),
        _ => {
            let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    }
}

/// NPY v1.0, little-endian f64, C order.
fn encode_npy(shape: &[usize], data: &[f64]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(shape)
    );
    // magic (6) + version (2) + header length (2) + header, padded with
    // spaces and terminated by a newline.
    let unpadded = NPY_MAGIC.len() + 4 + header.len() + 1;
    let pad = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    header.extend(std::iter::repeat_n(' ', pad));
    header.push('\n');

    let mut out = Vec::with_capacity(NPY_MAGIC.len() + 4 + header.len() + data.len() * 8);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode_npy(name: &str, bytes: &[u8]) -> Result<(Vec<usize>, Vec<f64>), ArchiveError> {
    let err = |reason: &str| ArchiveError::Npy {
        name: name.into(),
        reason: reason.into(),
    };

    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(err("missing NPY magic"));
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(err("unsupported NPY version")),
    };
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| err("truncated header"))?;

    if !header.contains("'descr': '<f8'") {
        return Err(err("only little-endian f64 arrays are supported"));
    }
    if header.contains("'fortran_order': True") {
        return Err(err("fortran order is not supported"));
    }
    let shape = parse_shape(header).ok_or_else(|| err("malformed shape"))?;

    let count: usize = shape.iter().product();
    let payload = &bytes[data_start..];
    if payload.len() != count * 8 {
        return Err(err("payload size does not match shape"));
    }
    let data = payload
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    Ok((shape, data))
}

fn parse_shape(header: &str) -> Option<Vec<usize>> {
    let start = header.find("'shape':")? + "'shape':".len();
    let rest = header[start..].trim_start().strip_prefix('(')?;
    let end = rest.find(')')?;
    rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}
