use crate::params::ChessParams;
use camcal_core::Corner;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use log::debug;
use nalgebra::Point2;
#[cfg(feature = "tracing")]
use tracing::instrument;

impl ChessParams {
    /// Single-scale `chess-corners` configuration with these thresholds.
    pub fn to_chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel as _;
        cfg.params.nms_radius = self.nms_radius as _;
        cfg
    }
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        strength: c.response,
    }
}

/// Raw ChESS corner candidates, adapted into [`Corner`]s.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn find_corners(img: &image::GrayImage, params: &ChessParams) -> Vec<Corner> {
    let corners: Vec<Corner> = find_chess_corners_image(img, &params.to_chess_config())
        .iter()
        .filter(|c| c.response > params.threshold_abs)
        .map(adapt_chess_corner)
        .collect();
    debug!("{} corner candidates", corners.len());
    corners
}
