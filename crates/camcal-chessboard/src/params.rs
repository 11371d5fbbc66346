use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of inner corners of the checkerboard.
///
/// `rows` counts corners along the board x axis (the axis that varies
/// fastest in the canonical ordering), `cols` along the board y axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PatternSize {
    pub rows: u32,
    pub cols: u32,
}

impl PatternSize {
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn corner_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl Default for PatternSize {
    fn default() -> Self {
        Self::new(8, 6)
    }
}

/// ChESS corner response and candidate extraction.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessParams {
    /// Candidates must reach this fraction of the strongest response.
    pub threshold_rel: f32,
    /// Absolute floor on the response; only positive responses are corners.
    pub threshold_abs: f32,
    /// Half-size of the non-maximum suppression window.
    pub nms_radius: u32,
}

impl Default for ChessParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            threshold_abs: 0.0,
            nms_radius: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 50.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Sub-pixel corner refinement (gradient orthogonality iteration).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Search window is `(2 * half_window + 1)` pixels square.
    pub half_window: u32,
    pub max_iters: u32,
    /// Stop once a step moves the corner by less than this many pixels.
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.001,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    pub pattern: PatternSize,

    pub chess: ChessParams,

    pub graph: GridGraphParams,

    /// Derive the neighbour distance window from the median nearest-neighbour
    /// distance instead of `graph.min_spacing_pix` / `graph.max_spacing_pix`.
    pub adaptive_spacing: bool,

    /// Window relative to the median spacing, used with `adaptive_spacing`.
    pub spacing_window: [f32; 2],

    /// Images whose larger side exceeds this are box-downsampled for
    /// detection. Positions are always reported in full resolution.
    pub max_detection_dim: Option<u32>,

    /// Reject connected grids with more corners than the pattern instead of
    /// picking the strongest `rows x cols` window inside them.
    pub require_exact_grid: bool,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            pattern: PatternSize::default(),
            chess: ChessParams::default(),
            graph: GridGraphParams::default(),
            adaptive_spacing: true,
            spacing_window: [0.5, 2.0],
            max_detection_dim: Some(1600),
            require_exact_grid: false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamsError {
    #[error("pattern needs at least 2x2 inner corners, got {rows}x{cols}")]
    PatternTooSmall { rows: u32, cols: u32 },
    #[error("invalid spacing window [{0}, {1}]")]
    SpacingWindow(f32, f32),
    #[error("k_neighbors must be positive")]
    NoNeighbors,
}

impl ChessboardParams {
    pub fn with_pattern(pattern: PatternSize) -> Self {
        Self {
            pattern,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        let PatternSize { rows, cols } = self.pattern;
        if rows < 2 || cols < 2 {
            return Err(ParamsError::PatternTooSmall { rows, cols });
        }
        let [lo, hi] = self.spacing_window;
        if !(lo > 0.0 && hi > lo) {
            return Err(ParamsError::SpacingWindow(lo, hi));
        }
        if self.graph.k_neighbors == 0 {
            return Err(ParamsError::NoNeighbors);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_an_eight_by_six_board() {
        let p = ChessboardParams::default();
        assert_eq!(p.pattern, PatternSize::new(8, 6));
        assert_eq!(p.pattern.corner_count(), 48);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validation_rejects_degenerate_settings() {
        let p = ChessboardParams::with_pattern(PatternSize::new(1, 6));
        assert_eq!(
            p.validate(),
            Err(ParamsError::PatternTooSmall { rows: 1, cols: 6 })
        );

        let p = ChessboardParams {
            spacing_window: [2.0, 0.5],
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(ParamsError::SpacingWindow(..))));
    }
}
