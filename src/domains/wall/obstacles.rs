use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::surface::Cell;

/// Sparse set of occupied cells over a wall's grid, pinned to a version.
/// Maps are immutable snapshots: obstacle ingestion never edits a map in
/// place, it produces the next version. Planners hold an `Arc` to the
/// snapshot they started with, so ingestion cannot race a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleMap {
    pub wall_id: String,
    pub version: u64,
    pub blocked: BTreeSet<Cell>,
    pub updated_at: DateTime<Utc>,
}

impl ObstacleMap {
    pub fn new(wall_id: String, version: u64, blocked: BTreeSet<Cell>) -> Self {
        Self {
            wall_id,
            version,
            blocked,
            updated_at: Utc::now(),
        }
    }

    pub fn empty(wall_id: String, version: u64) -> Self {
        Self::new(wall_id, version, BTreeSet::new())
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }

    /// The successor snapshot with a new occupancy set.
    pub fn next_version(&self, blocked: BTreeSet<Cell>) -> Self {
        Self::new(self.wall_id.clone(), self.version + 1, blocked)
    }
}
