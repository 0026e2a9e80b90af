use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Stale obstacle data for wall {wall_id}: required version >= {min_version}, newest is {newest}")]
    Stale {
        wall_id: String,
        min_version: u64,
        newest: u64,
    },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Incomplete path: acknowledged sequence {acked} of {expected}")]
    IncompletePath { acked: u64, expected: u64 },

    #[error("Planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

/// Terminal outcomes of a planner invocation. These fail the job that
/// requested the plan but never the service itself.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningError {
    #[error("goal is unreachable from the start cell")]
    Unreachable,

    #[error("coverage region contains no traversable cells")]
    EmptyRegion,

    #[error("expansion budget of {budget} frontier pops exceeded")]
    Timeout { budget: u64 },
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Event store error: {0}")]
    EventStore(String),

    #[error("Dispatch failed after {attempts} attempts: {last_error}")]
    Dispatch { attempts: u32, last_error: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

/// Why a job ended in the `Failed` state. Persisted with the job and
/// surfaced verbatim through the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    WallNotFound,
    StaleObstacles,
    Unreachable,
    EmptyRegion,
    PlannerTimeout,
    DispatchFailure,
    ExecutionTimeout,
    ServiceUnavailable,
    Fault(String),
}

impl FailureReason {
    pub fn from_planning(err: &PlanningError) -> Self {
        match err {
            PlanningError::Unreachable => FailureReason::Unreachable,
            PlanningError::EmptyRegion => FailureReason::EmptyRegion,
            PlanningError::Timeout { .. } => FailureReason::PlannerTimeout,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::WallNotFound => write!(f, "wall not found"),
            FailureReason::StaleObstacles => write!(f, "obstacle data too stale"),
            FailureReason::Unreachable => write!(f, "goal unreachable"),
            FailureReason::EmptyRegion => write!(f, "coverage region empty"),
            FailureReason::PlannerTimeout => write!(f, "planner expansion budget exceeded"),
            FailureReason::DispatchFailure => write!(f, "instruction dispatch failed"),
            FailureReason::ExecutionTimeout => write!(f, "no execution progress before deadline"),
            FailureReason::ServiceUnavailable => {
                write!(f, "dependent service unavailable after retries")
            }
            FailureReason::Fault(reason) => write!(f, "robot fault: {}", reason),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
