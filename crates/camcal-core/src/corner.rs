use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Canonical 2D corner candidate produced by the corner detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Corner {
    /// Corner position in pixel coordinates (pixel centres at integers).
    pub position: Point2<f32>,

    /// Diagonal direction reported by the ChESS detector, in radians.
    ///
    /// Defined modulo π: chessboard diagonals are undirected. Neighbouring
    /// corners on a board have orthogonal orientations.
    pub orientation: f32,

    /// Detector response at the corner.
    pub strength: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32, orientation: f32, strength: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
            strength,
        }
    }
}

/// Integer grid coordinates (i, j) in board space.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

/// A corner that belongs to a detected board, with its board coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledCorner {
    /// Pixel position.
    pub position: Point2<f32>,

    /// Integer coordinates on the board.
    pub grid: GridCoords,

    /// Detector response carried over from the raw corner.
    pub strength: f32,
}
