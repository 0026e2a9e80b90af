use std::sync::Arc;

use super::obstacles::ObstacleMap;
use super::surface::{Cell, WallSurface};

/// Cost of a cardinal step. Integer costs keep search results byte-stable
/// across runs and platforms.
pub const STRAIGHT_COST: u64 = 10;
/// Cost of a diagonal step (~sqrt(2) * STRAIGHT_COST).
pub const DIAGONAL_COST: u64 = 14;

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Read-only view of a wall's traversable space against one obstacle-map
/// snapshot. All queries are pure; the snapshot never changes underneath
/// the search holding it.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    surface: WallSurface,
    map: Arc<ObstacleMap>,
}

impl SpatialGrid {
    pub fn new(surface: WallSurface, map: Arc<ObstacleMap>) -> Self {
        Self { surface, map }
    }

    pub fn surface(&self) -> &WallSurface {
        &self.surface
    }

    pub fn map(&self) -> &ObstacleMap {
        &self.map
    }

    pub fn is_traversable(&self, cell: Cell) -> bool {
        self.surface.contains(cell) && !self.map.is_blocked(cell)
    }

    /// Adjacent traversable cells, 8-connected. Diagonal moves are refused
    /// when either orthogonally adjacent cell is occupied: the robot body
    /// cannot cut a corner around an obstacle.
    pub fn neighbors(&self, cell: Cell) -> Vec<Cell> {
        let mut out = Vec::with_capacity(8);
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let next = Cell::new(cell.x + dx, cell.y + dy);
            if !self.is_traversable(next) {
                continue;
            }
            if dx != 0 && dy != 0 {
                let side_a = Cell::new(cell.x + dx, cell.y);
                let side_b = Cell::new(cell.x, cell.y + dy);
                if !self.is_traversable(side_a) || !self.is_traversable(side_b) {
                    continue;
                }
            }
            out.push(next);
        }
        out
    }

    /// Cost of one discretized step between adjacent cells.
    pub fn step_cost(&self, a: Cell, b: Cell) -> u64 {
        if a.x != b.x && a.y != b.y {
            DIAGONAL_COST
        } else {
            STRAIGHT_COST
        }
    }

    /// Octile distance: admissible and consistent for the 10/14 cost model,
    /// so A* stays optimal.
    pub fn heuristic(&self, from: Cell, to: Cell) -> u64 {
        octile_distance(from, to)
    }
}

pub fn octile_distance(from: Cell, to: Cell) -> u64 {
    let dx = (from.x - to.x).unsigned_abs() as u64;
    let dy = (from.y - to.y).unsigned_abs() as u64;
    let diag = dx.min(dy);
    let straight = dx.max(dy) - diag;
    DIAGONAL_COST * diag + STRAIGHT_COST * straight
}
