use std::sync::Arc;
use uuid::Uuid;

use crate::common::PlanningError;
use crate::domains::wall::{ObstacleMap, SpatialGrid, WallSurface};

use super::astar::{shortest_path, ExpansionBudget};
use super::coverage::cover_region;
use super::path::{PlanGoal, PlanRequest, PlannedPath};

/// The planner proper: a pure function of (surface, obstacle snapshot,
/// request) plus an expansion budget. Identical inputs produce identical
/// waypoint sequences; only the generated plan id differs between runs.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    expansion_budget: u64,
}

impl PathPlanner {
    pub fn new(expansion_budget: u64) -> Self {
        Self { expansion_budget }
    }

    pub fn plan(
        &self,
        surface: &WallSurface,
        map: Arc<ObstacleMap>,
        request: &PlanRequest,
    ) -> Result<PlannedPath, PlanningError> {
        let map_version = map.version;
        let grid = SpatialGrid::new(surface.clone(), map);
        let mut budget = ExpansionBudget::new(self.expansion_budget);

        let leg = match &request.goal {
            PlanGoal::Target(goal) => shortest_path(&grid, request.start, *goal, &mut budget)?,
            PlanGoal::Coverage(region) => cover_region(&grid, request.start, region, &mut budget)?,
        };

        tracing::debug!(
            "planned path for wall {} against map v{}: {} waypoints, cost {}",
            request.wall_id,
            map_version,
            leg.cells.len(),
            leg.cost
        );

        Ok(PlannedPath::from_cells(
            Uuid::new_v4().to_string(),
            request.wall_id.clone(),
            map_version,
            leg.cells,
            leg.cost,
        ))
    }
}
