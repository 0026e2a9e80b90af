use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::common::PlanningError;
use crate::domains::wall::{Cell, SpatialGrid};

/// Shared frontier-pop budget. Coverage planning decomposes into several
/// searches that all draw from the same budget, so a pathological map
/// cannot keep a job spinning.
#[derive(Debug, Clone)]
pub struct ExpansionBudget {
    total: u64,
    remaining: u64,
}

impl ExpansionBudget {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            remaining: total,
        }
    }

    fn consume(&mut self) -> Result<(), PlanningError> {
        if self.remaining == 0 {
            return Err(PlanningError::Timeout { budget: self.total });
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// One optimal leg found by the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub cells: Vec<Cell>,
    pub cost: u64,
}

/// Frontier entry ordered by f, then h (goal-directed tie-break), then cell
/// order. The total ordering makes expansion, and therefore the returned
/// path, identical for identical inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    f: u64,
    h: u64,
    cell: Cell,
}

/// A* over the spatial grid: minimum-cost path from `start` to `goal`
/// against the grid's obstacle snapshot.
pub fn shortest_path(
    grid: &SpatialGrid,
    start: Cell,
    goal: Cell,
    budget: &mut ExpansionBudget,
) -> Result<Leg, PlanningError> {
    if !grid.is_traversable(start) || !grid.is_traversable(goal) {
        return Err(PlanningError::Unreachable);
    }
    if start == goal {
        return Ok(Leg {
            cells: vec![start],
            cost: 0,
        });
    }

    let mut open: BinaryHeap<Reverse<FrontierEntry>> = BinaryHeap::new();
    let mut g_score: HashMap<Cell, u64> = HashMap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();

    g_score.insert(start, 0);
    open.push(Reverse(FrontierEntry {
        f: grid.heuristic(start, goal),
        h: grid.heuristic(start, goal),
        cell: start,
    }));

    while let Some(Reverse(entry)) = open.pop() {
        let current = entry.cell;
        let current_g = entry.f - entry.h;
        // Entries left behind by a better re-discovery are skipped.
        if current_g > *g_score.get(&current).unwrap_or(&u64::MAX) {
            continue;
        }
        budget.consume()?;

        if current == goal {
            return Ok(Leg {
                cells: reconstruct(&came_from, current),
                cost: current_g,
            });
        }

        for neighbor in grid.neighbors(current) {
            let tentative = current_g + grid.step_cost(current, neighbor);
            if tentative < *g_score.get(&neighbor).unwrap_or(&u64::MAX) {
                g_score.insert(neighbor, tentative);
                came_from.insert(neighbor, current);
                let h = grid.heuristic(neighbor, goal);
                open.push(Reverse(FrontierEntry {
                    f: tentative + h,
                    h,
                    cell: neighbor,
                }));
            }
        }
    }

    Err(PlanningError::Unreachable)
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, goal: Cell) -> Vec<Cell> {
    let mut cells = vec![goal];
    let mut current = goal;
    while let Some(prev) = came_from.get(&current) {
        cells.push(*prev);
        current = *prev;
    }
    cells.reverse();
    cells
}
