use serde::{Deserialize, Serialize};

use crate::domains::planning::Waypoint;

/// One instruction on the outbound queue: a waypoint batch tagged with the
/// job id, a strictly increasing sequence number within the job, and an
/// idempotency token. The transport is at-least-once; the robot side must
/// treat redelivery of an already-applied `(job_id, sequence)` as a no-op.
/// The dispatcher assumes that contract, it does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionMessage {
    pub job_id: String,
    pub sequence: u64,
    pub idempotency_token: String,
    pub waypoints: Vec<Waypoint>,
    pub is_final: bool,
}

impl InstructionMessage {
    pub fn token(job_id: &str, sequence: u64) -> String {
        format!("{}:{}", job_id, sequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckEvent {
    Ack,
    Complete,
    Fault,
}

/// Status report from the robot, delivered over the reply queue. Duplicate
/// and out-of-order deliveries are expected and absorbed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub job_id: String,
    pub sequence: u64,
    pub event: AckEvent,
    pub reason: Option<String>,
}

impl AckMessage {
    pub fn ack(job_id: &str, sequence: u64) -> Self {
        Self {
            job_id: job_id.to_string(),
            sequence,
            event: AckEvent::Ack,
            reason: None,
        }
    }

    pub fn complete(job_id: &str, sequence: u64) -> Self {
        Self {
            job_id: job_id.to_string(),
            sequence,
            event: AckEvent::Complete,
            reason: None,
        }
    }

    pub fn fault(job_id: &str, sequence: u64, reason: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            sequence,
            event: AckEvent::Fault,
            reason: Some(reason.to_string()),
        }
    }
}
