use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{DomainEvent, FailureReason};
use crate::domains::planning::PlanRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    JobCreated {
        job_id: String,
        request: PlanRequest,
        timestamp: DateTime<Utc>,
    },
    PlanningStarted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    PlanReady {
        job_id: String,
        plan_id: String,
        map_version: u64,
        total_cost: u64,
        final_sequence: u64,
        timestamp: DateTime<Utc>,
    },
    DispatchStarted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The queue confirmed durable acceptance of one instruction. The
    /// highest confirmed sequence is what a restarted dispatcher resumes
    /// after, so redelivery never starts from scratch.
    InstructionConfirmed {
        job_id: String,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },
    DispatchCompleted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    AckReceived {
        job_id: String,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },
    JobCompleted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    JobFailed {
        job_id: String,
        reason: FailureReason,
        timestamp: DateTime<Utc>,
    },
    JobCancelled {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for JobEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobEvent::JobCreated { .. } => "JobCreated",
            JobEvent::PlanningStarted { .. } => "PlanningStarted",
            JobEvent::PlanReady { .. } => "PlanReady",
            JobEvent::DispatchStarted { .. } => "DispatchStarted",
            JobEvent::InstructionConfirmed { .. } => "InstructionConfirmed",
            JobEvent::DispatchCompleted { .. } => "DispatchCompleted",
            JobEvent::AckReceived { .. } => "AckReceived",
            JobEvent::JobCompleted { .. } => "JobCompleted",
            JobEvent::JobFailed { .. } => "JobFailed",
            JobEvent::JobCancelled { .. } => "JobCancelled",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            JobEvent::JobCreated { job_id, .. } => job_id,
            JobEvent::PlanningStarted { job_id, .. } => job_id,
            JobEvent::PlanReady { job_id, .. } => job_id,
            JobEvent::DispatchStarted { job_id, .. } => job_id,
            JobEvent::InstructionConfirmed { job_id, .. } => job_id,
            JobEvent::DispatchCompleted { job_id, .. } => job_id,
            JobEvent::AckReceived { job_id, .. } => job_id,
            JobEvent::JobCompleted { job_id, .. } => job_id,
            JobEvent::JobFailed { job_id, .. } => job_id,
            JobEvent::JobCancelled { job_id, .. } => job_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobCreated { timestamp, .. } => *timestamp,
            JobEvent::PlanningStarted { timestamp, .. } => *timestamp,
            JobEvent::PlanReady { timestamp, .. } => *timestamp,
            JobEvent::DispatchStarted { timestamp, .. } => *timestamp,
            JobEvent::InstructionConfirmed { timestamp, .. } => *timestamp,
            JobEvent::DispatchCompleted { timestamp, .. } => *timestamp,
            JobEvent::AckReceived { timestamp, .. } => *timestamp,
            JobEvent::JobCompleted { timestamp, .. } => *timestamp,
            JobEvent::JobFailed { timestamp, .. } => *timestamp,
            JobEvent::JobCancelled { timestamp, .. } => *timestamp,
        }
    }
}
