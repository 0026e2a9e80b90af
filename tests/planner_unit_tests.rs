use std::collections::BTreeSet;
use std::sync::Arc;

use plasterbot::common::PlanningError;
use plasterbot::domains::planning::{
    cover_region, shortest_path, CoverageRegion, ExpansionBudget, PathPlanner, PlanGoal,
    PlanRequest, PlannedPath,
};
use plasterbot::domains::wall::{Cell, Heading, ObstacleMap, SpatialGrid, WallSurface, DIAGONAL_COST};

fn surface_10x10() -> WallSurface {
    WallSurface::new("wall-1".to_string(), 10.0, 10.0, 1.0).unwrap()
}

fn map_with_blocked(blocked: &[(i32, i32)]) -> Arc<ObstacleMap> {
    let cells: BTreeSet<Cell> = blocked.iter().map(|&(x, y)| Cell::new(x, y)).collect();
    Arc::new(ObstacleMap::new("wall-1".to_string(), 1, cells))
}

fn grid_with_blocked(blocked: &[(i32, i32)]) -> SpatialGrid {
    SpatialGrid::new(surface_10x10(), map_with_blocked(blocked))
}

fn target_request(start: (i32, i32), goal: (i32, i32)) -> PlanRequest {
    PlanRequest {
        wall_id: "wall-1".to_string(),
        start: Cell::new(start.0, start.1),
        goal: PlanGoal::Target(Cell::new(goal.0, goal.1)),
        min_map_version: 1,
        idempotency_key: "req-1".to_string(),
    }
}

#[cfg(test)]
mod astar_tests {
    use super::*;

    #[test]
    fn test_open_grid_diagonal_is_optimal() {
        // 10x10, no obstacles, corner to corner: nine diagonal steps.
        let grid = grid_with_blocked(&[]);
        let mut budget = ExpansionBudget::new(10_000);
        let leg = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9), &mut budget).unwrap();

        assert_eq!(leg.cost, 9 * DIAGONAL_COST);
        assert_eq!(leg.cells.len(), 10);
        assert_eq!(leg.cells.first(), Some(&Cell::new(0, 0)));
        assert_eq!(leg.cells.last(), Some(&Cell::new(9, 9)));
    }

    #[test]
    fn test_consecutive_cells_are_single_steps() {
        let grid = grid_with_blocked(&[(4, 0), (4, 1), (4, 2), (4, 3), (4, 4)]);
        let mut budget = ExpansionBudget::new(10_000);
        let leg = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 0), &mut budget).unwrap();

        for pair in leg.cells.windows(2) {
            let dx = (pair[1].x - pair[0].x).abs();
            let dy = (pair[1].y - pair[0].y).abs();
            assert!(dx <= 1 && dy <= 1 && (dx + dy) > 0);
        }
    }

    #[test]
    fn test_path_routes_around_wall_of_obstacles() {
        // Vertical barrier with a gap at y = 8.
        let barrier: Vec<(i32, i32)> = (0..8).map(|y| (5, y)).collect();
        let grid = grid_with_blocked(&barrier);
        let mut budget = ExpansionBudget::new(10_000);
        let leg = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 0), &mut budget).unwrap();

        assert!(leg.cells.iter().any(|c| c.y >= 8));
        assert!(!leg.cells.iter().any(|c| barrier.contains(&(c.x, c.y))));
    }

    #[test]
    fn test_same_cell_start_and_goal() {
        let grid = grid_with_blocked(&[]);
        let mut budget = ExpansionBudget::new(10_000);
        let leg = shortest_path(&grid, Cell::new(3, 3), Cell::new(3, 3), &mut budget).unwrap();
        assert_eq!(leg.cells, vec![Cell::new(3, 3)]);
        assert_eq!(leg.cost, 0);
    }

    #[test]
    fn test_enclosed_start_is_unreachable() {
        let ring = [
            (4, 4), (5, 4), (6, 4),
            (4, 5),         (6, 5),
            (4, 6), (5, 6), (6, 6),
        ];
        let grid = grid_with_blocked(&ring);
        let mut budget = ExpansionBudget::new(10_000);
        let result = shortest_path(&grid, Cell::new(5, 5), Cell::new(0, 0), &mut budget);
        assert_eq!(result.unwrap_err(), PlanningError::Unreachable);
    }

    #[test]
    fn test_blocked_goal_is_unreachable() {
        let grid = grid_with_blocked(&[(9, 9)]);
        let mut budget = ExpansionBudget::new(10_000);
        let result = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9), &mut budget);
        assert_eq!(result.unwrap_err(), PlanningError::Unreachable);
    }

    #[test]
    fn test_expansion_budget_exhaustion() {
        let grid = grid_with_blocked(&[]);
        let mut budget = ExpansionBudget::new(3);
        let result = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9), &mut budget);
        assert_eq!(result.unwrap_err(), PlanningError::Timeout { budget: 3 });
    }

    #[test]
    fn test_astar_cost_matches_exhaustive_search() {
        // Uniform-cost search over the whole grid as the reference.
        fn exhaustive_cost(
            grid: &plasterbot::domains::wall::SpatialGrid,
            start: Cell,
            goal: Cell,
        ) -> Option<u64> {
            use std::collections::BTreeMap;
            let mut dist: BTreeMap<Cell, u64> = BTreeMap::new();
            dist.insert(start, 0);
            let mut frontier = vec![start];
            while let Some(current) = frontier.pop() {
                let d = dist[&current];
                for neighbor in grid.neighbors(current) {
                    let candidate = d + grid.step_cost(current, neighbor);
                    if candidate < *dist.get(&neighbor).unwrap_or(&u64::MAX) {
                        dist.insert(neighbor, candidate);
                        frontier.push(neighbor);
                    }
                }
            }
            dist.get(&goal).copied()
        }

        let layouts: [&[(i32, i32)]; 3] = [
            &[],
            &[(2, 2), (2, 3), (2, 4), (3, 2)],
            &[(1, 1), (3, 1), (5, 1), (1, 3), (3, 3), (5, 3), (7, 7)],
        ];
        for blocked in layouts {
            let grid = grid_with_blocked(blocked);
            let mut budget = ExpansionBudget::new(100_000);
            let leg = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9), &mut budget).unwrap();
            assert_eq!(
                Some(leg.cost),
                exhaustive_cost(&grid, Cell::new(0, 0), Cell::new(9, 9))
            );
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        let blocked = [(2, 3), (3, 3), (4, 3), (6, 6), (6, 7)];
        let first = {
            let grid = grid_with_blocked(&blocked);
            let mut budget = ExpansionBudget::new(10_000);
            shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9), &mut budget).unwrap()
        };
        for _ in 0..5 {
            let grid = grid_with_blocked(&blocked);
            let mut budget = ExpansionBudget::new(10_000);
            let again =
                shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9), &mut budget).unwrap();
            assert_eq!(first, again);
        }
    }
}

#[cfg(test)]
mod coverage_tests {
    use super::*;

    #[test]
    fn test_coverage_passes_over_every_traversable_cell() {
        let grid = grid_with_blocked(&[]);
        let region = CoverageRegion::new(Cell::new(0, 0), Cell::new(3, 3)).unwrap();
        let mut budget = ExpansionBudget::new(100_000);
        let leg = cover_region(&grid, Cell::new(0, 0), &region, &mut budget).unwrap();

        for cell in region.cells() {
            assert!(leg.cells.contains(&cell), "cell {} not covered", cell);
        }
        assert_eq!(leg.cells.first(), Some(&Cell::new(0, 0)));
    }

    #[test]
    fn test_coverage_skips_occupied_cells() {
        let grid = grid_with_blocked(&[(1, 1), (2, 2)]);
        let region = CoverageRegion::new(Cell::new(0, 0), Cell::new(3, 3)).unwrap();
        let mut budget = ExpansionBudget::new(100_000);
        let leg = cover_region(&grid, Cell::new(0, 0), &region, &mut budget).unwrap();

        assert!(!leg.cells.contains(&Cell::new(1, 1)));
        assert!(!leg.cells.contains(&Cell::new(2, 2)));
        for cell in region.cells() {
            if !grid.map().is_blocked(cell) {
                assert!(leg.cells.contains(&cell), "cell {} not covered", cell);
            }
        }
    }

    #[test]
    fn test_coverage_of_fully_blocked_region_is_empty() {
        let grid = grid_with_blocked(&[(8, 8), (9, 8), (8, 9), (9, 9)]);
        let region = CoverageRegion::new(Cell::new(8, 8), Cell::new(9, 9)).unwrap();
        let mut budget = ExpansionBudget::new(100_000);
        let result = cover_region(&grid, Cell::new(0, 0), &region, &mut budget);
        assert_eq!(result.unwrap_err(), PlanningError::EmptyRegion);
    }

    #[test]
    fn test_coverage_unreachable_region() {
        // Region sealed off behind a full-height barrier.
        let barrier: Vec<(i32, i32)> = (0..10).map(|y| (5, y)).collect();
        let grid = grid_with_blocked(&barrier);
        let region = CoverageRegion::new(Cell::new(7, 0), Cell::new(8, 1)).unwrap();
        let mut budget = ExpansionBudget::new(100_000);
        let result = cover_region(&grid, Cell::new(0, 0), &region, &mut budget);
        assert_eq!(result.unwrap_err(), PlanningError::Unreachable);
    }

    #[test]
    fn test_coverage_cost_is_sum_of_leg_costs() {
        let grid = grid_with_blocked(&[]);
        let region = CoverageRegion::new(Cell::new(0, 0), Cell::new(1, 0)).unwrap();
        let mut budget = ExpansionBudget::new(100_000);
        let leg = cover_region(&grid, Cell::new(0, 0), &region, &mut budget).unwrap();
        // One straight step from (0,0) to (1,0).
        assert_eq!(leg.cost, 10);
        assert_eq!(leg.cells, vec![Cell::new(0, 0), Cell::new(1, 0)]);
    }
}

#[cfg(test)]
mod planner_tests {
    use super::*;

    #[test]
    fn test_planner_records_map_version_and_cost() {
        let planner = PathPlanner::new(10_000);
        let surface = surface_10x10();
        let mut map = map_with_blocked(&[]);
        Arc::make_mut(&mut map).version = 7;

        let plan = planner
            .plan(&surface, map, &target_request((0, 0), (9, 9)))
            .unwrap();
        assert_eq!(plan.map_version, 7);
        assert_eq!(plan.total_cost, 9 * DIAGONAL_COST);
        assert_eq!(plan.waypoints.len(), 10);
    }

    #[test]
    fn test_planner_output_is_deterministic() {
        let planner = PathPlanner::new(10_000);
        let surface = surface_10x10();
        let request = target_request((0, 0), (9, 9));

        let first = planner
            .plan(&surface, map_with_blocked(&[(3, 3)]), &request)
            .unwrap();
        let second = planner
            .plan(&surface, map_with_blocked(&[(3, 3)]), &request)
            .unwrap();

        // Byte-identical waypoint sequences; only the plan id differs.
        assert_eq!(
            serde_json::to_vec(&first.waypoints).unwrap(),
            serde_json::to_vec(&second.waypoints).unwrap()
        );
        assert_eq!(first.total_cost, second.total_cost);
    }

    #[test]
    fn test_waypoint_headings_follow_movement() {
        let cells = vec![Cell::new(0, 0), Cell::new(1, 1), Cell::new(2, 1)];
        let path = PlannedPath::from_cells("p".to_string(), "wall-1".to_string(), 1, cells, 24);

        assert_eq!(path.waypoints[0].heading, Heading::NorthEast);
        assert_eq!(path.waypoints[1].heading, Heading::NorthEast);
        assert_eq!(path.waypoints[2].heading, Heading::East);
    }

    #[test]
    fn test_final_sequence_respects_batching() {
        let cells: Vec<Cell> = (0..10).map(|x| Cell::new(x, 0)).collect();
        let path = PlannedPath::from_cells("p".to_string(), "wall-1".to_string(), 1, cells, 90);
        assert_eq!(path.final_sequence(1), 10);
        assert_eq!(path.final_sequence(3), 4);
        assert_eq!(path.final_sequence(10), 1);
        assert_eq!(path.final_sequence(16), 1);
    }

    #[test]
    fn test_planned_path_serialization_round_trip() {
        let planner = PathPlanner::new(10_000);
        let surface = surface_10x10();
        let plan = planner
            .plan(&surface, map_with_blocked(&[]), &target_request((0, 0), (5, 5)))
            .unwrap();

        let serialized = serde_json::to_string(&plan).unwrap();
        let reloaded: PlannedPath = serde_json::from_str(&serialized).unwrap();
        assert_eq!(plan, reloaded);
    }

    #[test]
    fn test_request_validation() {
        let surface = surface_10x10();

        let mut request = target_request((0, 0), (9, 9));
        assert!(request.validate(&surface).is_ok());

        request.start = Cell::new(-1, 0);
        assert!(request.validate(&surface).is_err());

        let mut request = target_request((0, 0), (12, 0));
        assert!(request.validate(&surface).is_err());

        request = target_request((0, 0), (9, 9));
        request.idempotency_key = "  ".to_string();
        assert!(request.validate(&surface).is_err());

        let region_request = PlanRequest {
            wall_id: "wall-1".to_string(),
            start: Cell::new(0, 0),
            goal: PlanGoal::Coverage(
                CoverageRegion::new(Cell::new(5, 5), Cell::new(9, 9)).unwrap(),
            ),
            min_map_version: 1,
            idempotency_key: "req-2".to_string(),
        };
        assert!(region_request.validate(&surface).is_ok());
    }

    #[test]
    fn test_inverted_region_is_rejected() {
        assert!(CoverageRegion::new(Cell::new(5, 5), Cell::new(2, 2)).is_err());
    }
}
