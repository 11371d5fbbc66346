use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use camcal_core::Corner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Grid step `(di, dj)` taken along this direction.
    pub fn step(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Left => 1,
            Self::Up => 2,
            Self::Down => 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Classify `vec` against the board axes `u = (cos a, sin a)` and its
/// perpendicular `v`; `Down` is along `+v`.
fn direction_on_axes(vec: &Vector2<f32>, axis_angle: f32) -> NeighborDirection {
    let u = Vector2::new(axis_angle.cos(), axis_angle.sin());
    let v = Vector2::new(-u.y, u.x);
    let pu = vec.dot(&u);
    let pv = vec.dot(&v);
    if pu.abs() >= pv.abs() {
        if pu >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if pv >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
    axis_angle: f32,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // 1. Adjacent corners swap light and dark diagonals.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    // 2. Distance within the expected spacing.
    let vec_to_neighbor = neighbor.position - corner.position;
    let distance = vec_to_neighbor.norm();
    if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
        return None;
    }

    // 3. Grid edges run at 45° to both diagonals.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    let score_orientation =
        (FRAC_PI_2 - angle_diff_abs(corner.orientation, neighbor.orientation)).abs();

    Some(NodeNeighbor {
        direction: direction_on_axes(&vec_to_neighbor, axis_angle),
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbour per direction: the nearest, ties broken by score.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> [Option<NodeNeighbor>; 4] {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = &mut best[candidate.direction.slot()];
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.distance < current.distance
                    || (candidate.distance == current.distance && candidate.score < current.score)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }

    best
}

/// Median distance from each corner to its nearest other corner.
pub fn median_neighbor_spacing(corners: &[Corner]) -> Option<f32> {
    if corners.len() < 2 {
        return None;
    }
    let coords = corners
        .iter()
        .map(|c| [c.position.x, c.position.y])
        .collect::<Vec<_>>();
    let tree: KdTree<f32, 2> = (&coords).into();
    let Ok(qty) = 2usize.try_into() else {
        return None;
    };

    let mut dists: Vec<f32> = coords
        .iter()
        .enumerate()
        .filter_map(|(i, q)| {
            tree.nearest_n::<SquaredEuclidean>(q, qty)
                .into_iter()
                .find(|nn| nn.item as usize != i)
                .map(|nn| nn.distance.sqrt())
        })
        .collect();
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(f32::total_cmp);
    Some(dists[dists.len() / 2])
}

/// 4-connected neighbourhood graph over corner candidates.
///
/// An edge survives only when each endpoint picked the other for opposite
/// directions.
pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams, axis_angle: f32) -> Self {
        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        // Query one extra to account for the corner itself.
        let k = (params.k_neighbors + 1).min(corners.len()).max(1);

        let mut chosen: Vec<[Option<NodeNeighbor>; 4]> = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let Ok(qty) = k.try_into() else {
                chosen.push([None, None, None, None]);
                continue;
            };
            let query_point = [corner.position.x, corner.position.y];
            let results = tree.nearest_n::<SquaredEuclidean>(&query_point, qty);

            let candidates = results
                .into_iter()
                .map(|nn| nn.item as usize)
                .filter(|&j| j != i)
                .filter_map(|j| is_good_neighbor(corner, &corners[j], j, params, axis_angle))
                .collect();
            chosen.push(select_neighbors(candidates));
        }

        let neighbors = chosen
            .iter()
            .enumerate()
            .map(|(i, slots)| {
                slots
                    .iter()
                    .flatten()
                    .filter(|n| {
                        chosen[n.index][n.direction.opposite().slot()]
                            .as_ref()
                            .is_some_and(|back| back.index == i)
                    })
                    .cloned()
                    .collect()
            })
            .collect();

        Self { neighbors }
    }

    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }
}

pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut visited = vec![false; graph.neighbors.len()];
    let mut components = Vec::new();

    for start in 0..graph.neighbors.len() {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for neighbor in &graph.neighbors[node] {
                if !visited[neighbor.index] {
                    stack.push(neighbor.index);
                }
            }
        }

        components.push(component);
    }

    components
}

/// BFS integer coordinates for one component, starting at `component[0]`.
///
/// A node whose coordinate is already taken by another node is left
/// unassigned along that path; it may still be reached consistently through
/// another edge.
pub fn assign_grid_coordinates(graph: &GridGraph, component: &[usize]) -> HashMap<(i32, i32), usize> {
    let mut by_coord: HashMap<(i32, i32), usize> = HashMap::new();
    let Some(&start) = component.first() else {
        return by_coord;
    };

    let mut assigned: HashMap<usize, (i32, i32)> = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back((start, 0, 0));

    while let Some((node, i, j)) = queue.pop_front() {
        if assigned.contains_key(&node) || by_coord.contains_key(&(i, j)) {
            continue;
        }
        assigned.insert(node, (i, j));
        by_coord.insert((i, j), node);

        for neighbor in &graph.neighbors[node] {
            if assigned.contains_key(&neighbor.index) {
                continue;
            }
            let (di, dj) = neighbor.direction.step();
            queue.push_back((neighbor.index, i + di, j + dj));
        }
    }

    by_coord
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::collections::HashMap;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation,
            strength: 1.0,
        }
    }

    fn neighbor_map(neighbors: &[NodeNeighbor]) -> HashMap<NeighborDirection, &NodeNeighbor> {
        neighbors.iter().map(|n| (n.direction, n)).collect()
    }

    fn grid(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(make_corner(i as f32 * spacing, j as f32 * spacing, orientation));
            }
        }
        corners
    }

    fn params(min: f32, max: f32) -> GridGraphParams {
        GridGraphParams {
            min_spacing_pix: min,
            max_spacing_pix: max,
            ..Default::default()
        }
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let spacing = 10.0;
        let cols = 3;
        let corners = grid(cols, 3, spacing);
        let graph = GridGraph::new(&corners, &params(5.0, 15.0), 0.0);

        let idx = |i: usize, j: usize| j * cols + i;

        let center = neighbor_map(&graph.neighbors[idx(1, 1)]);
        assert_eq!(4, center.len());
        assert_eq!(idx(0, 1), center[&NeighborDirection::Left].index);
        assert_eq!(idx(2, 1), center[&NeighborDirection::Right].index);
        assert_eq!(idx(1, 0), center[&NeighborDirection::Up].index);
        assert_eq!(idx(1, 2), center[&NeighborDirection::Down].index);
        for n in center.values() {
            assert!((n.distance - spacing).abs() < 1e-4);
        }

        let top_left = neighbor_map(&graph.neighbors[idx(0, 0)]);
        assert_eq!(2, top_left.len());
        assert!(top_left.contains_key(&NeighborDirection::Right));
        assert!(top_left.contains_key(&NeighborDirection::Down));
        assert_eq!(graph.edge_count(), 12);
    }

    #[test]
    fn rotated_axis_relabels_directions() {
        let corners = grid(3, 3, 10.0);
        // Board axis pointing down the image: image +y is board "Right".
        let graph = GridGraph::new(&corners, &params(5.0, 15.0), FRAC_PI_2);
        let center = neighbor_map(&graph.neighbors[4]);
        assert_eq!(7, center[&NeighborDirection::Right].index);
        assert_eq!(3, center[&NeighborDirection::Down].index);
    }

    #[test]
    fn rejects_neighbors_when_orientation_relation_invalid() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 0.0, FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(5.0, 15.0), 0.0);
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn rejects_neighbors_outside_distance_window() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(30.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(5.0, 15.0), 0.0);
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn keeps_nearest_candidate_per_direction() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 0.0, 3.0 * FRAC_PI_4),
            make_corner(12.0, 0.0, 3.0 * FRAC_PI_4 + 0.1),
            make_corner(-10.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(5.0, 15.0), 0.0);

        let map = neighbor_map(&graph.neighbors[0]);
        assert_eq!(2, map.len());
        assert_eq!(1, map[&NeighborDirection::Right].index);
        assert_eq!(3, map[&NeighborDirection::Left].index);
        // Corner 2 chose corner 0 as its left neighbour, but 0 preferred 1.
        assert!(graph.neighbors[2].is_empty());
    }

    #[test]
    fn bfs_assigns_consistent_coordinates() {
        let cols = 4;
        let corners = grid(cols, 3, 10.0);
        let graph = GridGraph::new(&corners, &params(5.0, 15.0), 0.0);
        let components = connected_components(&graph);
        assert_eq!(components.len(), 1);

        let coords = assign_grid_coordinates(&graph, &components[0]);
        assert_eq!(coords.len(), 12);
        let origin = components[0][0];
        let (oi, oj) = ((origin % cols) as i32, (origin / cols) as i32);
        for (&(i, j), &node) in &coords {
            assert_eq!((i + oi, j + oj), ((node % cols) as i32, (node / cols) as i32));
        }
    }

    #[test]
    fn median_spacing_ignores_self() {
        let corners = grid(4, 4, 12.0);
        let s = median_neighbor_spacing(&corners).expect("spacing");
        assert!((s - 12.0).abs() < 1e-4);
        assert!(median_neighbor_spacing(&corners[..1]).is_none());
    }
}
