//! Checkerboard detector built on top of `camcal-core`.
//!
//! Pipeline (graph-based, perspective-tolerant):
//! 1. ChESS corner candidates from `chess-corners` on the grayscale image
//!    (box-downsampled first when the image is larger than
//!    `max_detection_dim`), each with the direction of its diagonal.
//! 2. Candidates below `threshold_abs` are dropped.
//! 3. The dominant board axis is estimated from the diagonals in
//!    quadruple-angle space; the base spacing from nearest-neighbour distances.
//! 4. For each corner, up to 4 neighbours (right/left/up/down) are chosen from
//!    its k nearest candidates: orthogonal diagonals, edge at 45° to both,
//!    distance near the base spacing. Only mutual choices become edges.
//! 5. BFS over each connected component assigns integer coordinates.
//! 6. The strongest fully populated `rows x cols` window wins and is emitted
//!    in a canonical order.
//!
//! Sub-pixel refinement ([`refine_corners`]) is a separate step so callers can
//! run it on the full-resolution image.

mod corners;
mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use corners::find_corners;
pub use detector::{gray_view, ChessboardDetection, ChessboardDetector};
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor};
pub use params::{ChessParams, ChessboardParams, GridGraphParams, ParamsError, PatternSize, SubPixParams};
pub use subpix::{refine_corner, refine_corners};
