use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{DomainError, DomainResult};

/// One cell of a discretized wall surface. Ordered so that sets and
/// tie-breaks iterate the same way on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Direction of travel when entering a cell, 8-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heading {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Heading {
    /// Heading for a single-cell step `(dx, dy)`. Both deltas must be in
    /// `-1..=1` and not both zero.
    pub fn from_step(dx: i32, dy: i32) -> Option<Heading> {
        match (dx, dy) {
            (0, 1) => Some(Heading::North),
            (1, 1) => Some(Heading::NorthEast),
            (1, 0) => Some(Heading::East),
            (1, -1) => Some(Heading::SouthEast),
            (0, -1) => Some(Heading::South),
            (-1, -1) => Some(Heading::SouthWest),
            (-1, 0) => Some(Heading::West),
            (-1, 1) => Some(Heading::NorthWest),
            _ => None,
        }
    }
}

/// A wall surface registered with the service. Immutable once created;
/// every obstacle map and plan for the wall references it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallSurface {
    pub id: String,
    pub width_m: f64,
    pub height_m: f64,
    pub resolution_m: f64,
    pub created_at: DateTime<Utc>,
}

impl WallSurface {
    pub fn new(id: String, width_m: f64, height_m: f64, resolution_m: f64) -> DomainResult<Self> {
        if !(width_m > 0.0 && height_m > 0.0) {
            return Err(DomainError::InvalidRequest {
                reason: "wall dimensions must be positive".to_string(),
            });
        }
        if !(resolution_m > 0.0) {
            return Err(DomainError::InvalidRequest {
                reason: "discretization resolution must be positive".to_string(),
            });
        }
        Ok(Self {
            id,
            width_m,
            height_m,
            resolution_m,
            created_at: Utc::now(),
        })
    }

    pub fn cols(&self) -> i32 {
        (self.width_m / self.resolution_m).ceil() as i32
    }

    pub fn rows(&self) -> i32 {
        (self.height_m / self.resolution_m).ceil() as i32
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.cols() && cell.y >= 0 && cell.y < self.rows()
    }
}
