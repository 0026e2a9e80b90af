use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WallEvent {
    WallRegistered {
        wall_id: String,
        width_m: f64,
        height_m: f64,
        resolution_m: f64,
        timestamp: DateTime<Utc>,
    },
    /// New obstacle data was ingested for a wall. Consumers evict their
    /// cached copy; planners pinned to an older version are unaffected.
    ObstaclesIngested {
        wall_id: String,
        new_version: u64,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for WallEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WallEvent::WallRegistered { .. } => "WallRegistered",
            WallEvent::ObstaclesIngested { .. } => "ObstaclesIngested",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            WallEvent::WallRegistered { wall_id, .. } => wall_id,
            WallEvent::ObstaclesIngested { wall_id, .. } => wall_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WallEvent::WallRegistered { timestamp, .. } => *timestamp,
            WallEvent::ObstaclesIngested { timestamp, .. } => *timestamp,
        }
    }
}
