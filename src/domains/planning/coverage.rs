use std::collections::BTreeSet;

use crate::common::PlanningError;
use crate::domains::wall::{octile_distance, Cell, SpatialGrid};

use super::astar::{shortest_path, ExpansionBudget, Leg};
use super::path::CoverageRegion;

/// Coverage planning by greedy nearest-uncovered-cell decomposition: from
/// the current position, route to the uncovered region cell with the
/// smallest octile distance (ties broken by cell order), mark every region
/// cell the leg passes over as covered, repeat until the region is done.
///
/// Each leg is individually optimal; the leg ordering is not globally
/// optimized, so the concatenated cost is an upper bound on the best
/// possible coverage tour.
pub fn cover_region(
    grid: &SpatialGrid,
    start: Cell,
    region: &CoverageRegion,
    budget: &mut ExpansionBudget,
) -> Result<Leg, PlanningError> {
    let mut uncovered: BTreeSet<Cell> = region
        .cells()
        .filter(|c| grid.is_traversable(*c))
        .collect();
    if uncovered.is_empty() {
        return Err(PlanningError::EmptyRegion);
    }
    if !grid.is_traversable(start) {
        return Err(PlanningError::Unreachable);
    }

    let mut cells = vec![start];
    let mut total_cost = 0u64;
    let mut current = start;
    uncovered.remove(&start);

    while let Some(target) = nearest(current, &uncovered) {
        let leg = shortest_path(grid, current, target, budget)?;
        for cell in &leg.cells {
            uncovered.remove(cell);
        }
        // The leg starts where the previous one ended; drop the duplicate.
        cells.extend(leg.cells.into_iter().skip(1));
        total_cost += leg.cost;
        current = target;
    }

    Ok(Leg {
        cells,
        cost: total_cost,
    })
}

fn nearest(from: Cell, uncovered: &BTreeSet<Cell>) -> Option<Cell> {
    uncovered
        .iter()
        .copied()
        .min_by_key(|c| (octile_distance(from, *c), *c))
}
