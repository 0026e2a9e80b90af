use serde::{Deserialize, Serialize};

use crate::common::{DomainError, DomainResult};
use crate::domains::wall::{Cell, Heading, WallSurface};

/// What a plan must achieve: reach a single cell, or pass over every
/// traversable cell of a region at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanGoal {
    Target(Cell),
    Coverage(CoverageRegion),
}

/// Axis-aligned rectangle of cells, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRegion {
    pub min: Cell,
    pub max: Cell,
}

impl CoverageRegion {
    pub fn new(min: Cell, max: Cell) -> DomainResult<Self> {
        if min.x > max.x || min.y > max.y {
            return Err(DomainError::InvalidRequest {
                reason: "coverage region corners are inverted".to_string(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }

    /// All cells of the region in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| Cell::new(x, y)))
    }
}

/// A planning request as submitted by the caller. Immutable; the obstacle
/// map version pins the snapshot the plan must be computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub wall_id: String,
    pub start: Cell,
    pub goal: PlanGoal,
    pub min_map_version: u64,
    pub idempotency_key: String,
}

impl PlanRequest {
    /// Structural validation performed before any job state is created.
    pub fn validate(&self, surface: &WallSurface) -> DomainResult<()> {
        if self.idempotency_key.trim().is_empty() {
            return Err(DomainError::InvalidRequest {
                reason: "idempotency key must not be empty".to_string(),
            });
        }
        if !surface.contains(self.start) {
            return Err(DomainError::InvalidRequest {
                reason: format!("start cell {} is outside the wall grid", self.start),
            });
        }
        match &self.goal {
            PlanGoal::Target(goal) => {
                if !surface.contains(*goal) {
                    return Err(DomainError::InvalidRequest {
                        reason: format!("goal cell {} is outside the wall grid", goal),
                    });
                }
            }
            PlanGoal::Coverage(region) => {
                if !surface.contains(region.min) || !surface.contains(region.max) {
                    return Err(DomainError::InvalidRequest {
                        reason: "coverage region extends outside the wall grid".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One step of a planned path: the cell to move to and the direction of
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub cell: Cell,
    pub heading: Heading,
}

/// The output of one planner invocation. Immutable once created; persisted
/// under `plan:{planId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPath {
    pub plan_id: String,
    pub wall_id: String,
    pub map_version: u64,
    pub waypoints: Vec<Waypoint>,
    pub total_cost: u64,
}

impl PlannedPath {
    /// Build a path from the raw cell sequence produced by the search.
    /// Headings are the direction of entry into each cell; the first
    /// waypoint takes the heading of the first move (East for a
    /// single-cell path).
    pub fn from_cells(
        plan_id: String,
        wall_id: String,
        map_version: u64,
        cells: Vec<Cell>,
        total_cost: u64,
    ) -> Self {
        let mut waypoints = Vec::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            let heading = if cells.len() == 1 {
                Heading::East
            } else if i == 0 {
                step_heading(cells[0], cells[1])
            } else {
                step_heading(cells[i - 1], cells[i])
            };
            waypoints.push(Waypoint {
                cell: *cell,
                heading,
            });
        }
        Self {
            plan_id,
            wall_id,
            map_version,
            waypoints,
            total_cost,
        }
    }

    /// Sequence number of the last instruction for this path given a batch
    /// size, i.e. the number of messages the dispatcher will publish.
    pub fn final_sequence(&self, batch_size: usize) -> u64 {
        let batch = batch_size.max(1);
        self.waypoints.len().div_ceil(batch) as u64
    }
}

fn step_heading(from: Cell, to: Cell) -> Heading {
    Heading::from_step(to.x - from.x, to.y - from.y)
        .unwrap_or(Heading::East)
}
