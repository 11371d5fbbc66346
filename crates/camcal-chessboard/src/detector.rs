use crate::corners::find_corners;
use crate::geom::board_axis_angle;
use crate::gridgraph::{assign_grid_coordinates, connected_components, median_neighbor_spacing, GridGraph};
use crate::params::{ChessboardParams, GridGraphParams, ParamsError, PatternSize};
use camcal_core::{downsample_box, Corner, GrayImageView, GridCoords, LabeledCorner};
use log::debug;
use nalgebra::{Point2, Vector2};
use std::collections::HashMap;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// A complete `rows x cols` corner grid.
///
/// `corners[b * rows + a]` is the corner at board coordinates `(a, b)`, with
/// `grid = GridCoords { i: a, j: b }`. The board x axis (`a`) points
/// rightwards in the image and `(a, b)` forms a right-handed frame in image
/// coordinates (y down), so the ordering is stable across views.
#[derive(Clone, Debug)]
pub struct ChessboardDetection {
    pub pattern: PatternSize,
    pub corners: Vec<LabeledCorner>,
}

impl ChessboardDetection {
    pub fn positions(&self) -> Vec<Point2<f32>> {
        self.corners.iter().map(|c| c.position).collect()
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }
}

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Checkerboard detector: ChESS corners, 4-connected grid graph, and a
/// search for a fully populated `rows x cols` window.
///
/// When the visible grid has more corners than the pattern, the strongest
/// window wins and it may sit at a different place on the physical board in
/// each view. Intrinsics are unaffected, but per-view poses then refer to
/// different board origins. Set [`ChessboardParams::require_exact_grid`] to
/// reject such grids instead.
#[derive(Clone, Debug)]
pub struct ChessboardDetector {
    params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ChessboardParams {
        &self.params
    }

    /// Integer downsampling factor used for corner detection.
    pub fn detection_factor(&self, width: usize, height: usize) -> usize {
        match self.params.max_detection_dim {
            Some(max_dim) if max_dim > 0 && width.max(height) > max_dim as usize => {
                width.max(height).div_ceil(max_dim as usize)
            }
            _ => 1,
        }
    }

    /// Detect the board in a grayscale image. Positions are pixel-level;
    /// run [`crate::refine_corners`] on the full-resolution image afterwards.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width(), height = img.height()))
    )]
    pub fn detect(&self, img: &image::GrayImage) -> Option<ChessboardDetection> {
        let factor = self.detection_factor(img.width() as usize, img.height() as usize);
        let corners = if factor > 1 {
            let small = downsample_box(&gray_view(img), factor);
            debug!(
                "detecting on {}x{} (downsampled by {})",
                small.width, small.height, factor
            );
            let small = image::GrayImage::from_raw(small.width as u32, small.height as u32, small.data)?;
            let f = factor as f32;
            let offset = (f - 1.0) * 0.5;
            find_corners(&small, &self.params.chess)
                .into_iter()
                .map(|c| Corner {
                    position: Point2::new(f * c.position.x + offset, f * c.position.y + offset),
                    ..c
                })
                .collect::<Vec<_>>()
        } else {
            find_corners(img, &self.params.chess)
        };

        self.detect_from_corners(&corners)
    }

    /// Grid search over precomputed corner candidates.
    pub fn detect_from_corners(&self, corners: &[Corner]) -> Option<ChessboardDetection> {
        let pattern = self.params.pattern;
        let needed = pattern.corner_count();
        if corners.len() < needed {
            debug!("{} candidates, need at least {}", corners.len(), needed);
            return None;
        }

        let Some(axis) = board_axis_angle(corners) else {
            debug!("no dominant board axis");
            return None;
        };

        let graph_params = if self.params.adaptive_spacing {
            let spacing = median_neighbor_spacing(corners)?;
            let [lo, hi] = self.params.spacing_window;
            GridGraphParams {
                min_spacing_pix: lo * spacing,
                max_spacing_pix: hi * spacing,
                ..self.params.graph.clone()
            }
        } else {
            self.params.graph.clone()
        };

        let graph = GridGraph::new(corners, &graph_params, axis);
        debug!(
            "grid graph: {} edges, axis {:.1} deg, spacing [{:.1}, {:.1}] px",
            graph.edge_count(),
            axis.to_degrees(),
            graph_params.min_spacing_pix,
            graph_params.max_spacing_pix
        );

        let mut best: Option<(f32, Vec<LabeledCorner>)> = None;
        for component in connected_components(&graph) {
            if component.len() < needed {
                continue;
            }
            let coords = assign_grid_coordinates(&graph, &component);
            if self.params.require_exact_grid && coords.len() > needed {
                debug!("grid of {} corners is larger than the pattern", coords.len());
                continue;
            }
            if let Some((score, labeled)) = best_window(&coords, corners, pattern) {
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((score, labeled));
                }
            }
        }

        let Some((_, labeled)) = best else {
            debug!("no complete {}x{} window", pattern.rows, pattern.cols);
            return None;
        };

        Some(ChessboardDetection {
            pattern,
            corners: canonical_order(labeled, pattern),
        })
    }
}

/// Strongest fully populated `rows x cols` window of the labelled grid, in
/// either axis assignment. Returned corners carry window-local `(a, b)`.
fn best_window(
    coords: &HashMap<(i32, i32), usize>,
    corners: &[Corner],
    pattern: PatternSize,
) -> Option<(f32, Vec<LabeledCorner>)> {
    let min_i = coords.keys().map(|k| k.0).min()?;
    let max_i = coords.keys().map(|k| k.0).max()?;
    let min_j = coords.keys().map(|k| k.1).min()?;
    let max_j = coords.keys().map(|k| k.1).max()?;

    let rows = pattern.rows as i32;
    let cols = pattern.cols as i32;
    let mut shapes = vec![(rows, cols, false)];
    if rows != cols {
        shapes.push((cols, rows, true));
    }

    let mut best: Option<(f32, i32, i32, bool)> = None;
    for (w, h, transposed) in shapes {
        for j0 in min_j..=max_j - h + 1 {
            for i0 in min_i..=max_i - w + 1 {
                let mut total = 0.0f32;
                let mut complete = true;
                'scan: for dj in 0..h {
                    for di in 0..w {
                        match coords.get(&(i0 + di, j0 + dj)) {
                            Some(&n) => total += corners[n].strength,
                            None => {
                                complete = false;
                                break 'scan;
                            }
                        }
                    }
                }
                if complete && best.is_none_or(|(s, ..)| total > s) {
                    best = Some((total, i0, j0, transposed));
                }
            }
        }
    }

    let (total, i0, j0, transposed) = best?;
    let (w, h) = if transposed { (cols, rows) } else { (rows, cols) };
    let mut labeled = Vec::with_capacity(pattern.corner_count());
    for dj in 0..h {
        for di in 0..w {
            let n = *coords.get(&(i0 + di, j0 + dj))?;
            let (a, b) = if transposed { (dj, di) } else { (di, dj) };
            labeled.push(LabeledCorner {
                position: corners[n].position,
                grid: GridCoords { i: a, j: b },
                strength: corners[n].strength,
            });
        }
    }
    Some((total, labeled))
}

/// Reorder to `k = b * rows + a` after fixing the handedness and the 180°
/// ambiguity of the board frame.
fn canonical_order(labeled: Vec<LabeledCorner>, pattern: PatternSize) -> Vec<LabeledCorner> {
    let rows = pattern.rows as i32;
    let cols = pattern.cols as i32;
    let idx = |a: i32, b: i32| (b * rows + a) as usize;

    let mut pos = vec![Vector2::<f32>::zeros(); pattern.corner_count()];
    for c in &labeled {
        pos[idx(c.grid.i, c.grid.j)] = c.position.coords;
    }

    let vx: Vector2<f32> = (0..cols).map(|b| pos[idx(rows - 1, b)] - pos[idx(0, b)]).sum();
    let vy: Vector2<f32> = (0..rows).map(|a| pos[idx(a, cols - 1)] - pos[idx(a, 0)]).sum();

    let flip_b = vx.x * vy.y - vx.y * vy.x < 0.0;
    let rotate = vx.x < 0.0;

    let mut out = labeled;
    for c in out.iter_mut() {
        let (mut a, mut b) = (c.grid.i, c.grid.j);
        if flip_b {
            b = cols - 1 - b;
        }
        if rotate {
            a = rows - 1 - a;
            b = cols - 1 - b;
        }
        c.grid = GridCoords { i: a, j: b };
    }
    out.sort_by_key(|c| idx(c.grid.i, c.grid.j));
    out
}
