use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{AggregateRoot, DomainError, DomainEvent, DomainResult, FailureReason};
use crate::domains::planning::{PlanRequest, PlannedPath};

use super::events::JobEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Planning,
    Planned,
    Dispatching,
    Dispatched,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Cancellation is only allowed before any instruction can be on the
    /// wire.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            JobState::Created | JobState::Planning | JobState::Planned
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Created => "Created",
            JobState::Planning => "Planning",
            JobState::Planned => "Planned",
            JobState::Dispatching => "Dispatching",
            JobState::Dispatched => "Dispatched",
            JobState::Executing => "Executing",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
            JobState::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

/// One planning request driven end-to-end. All mutation goes through the
/// command methods below, which validate the state machine, record a
/// `JobEvent` and apply it. `updated_at` doubles as the progress timestamp
/// the execution-timeout sweep compares against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub request: PlanRequest,
    pub state: JobState,
    pub plan_id: Option<String>,
    /// Sequence number of the final instruction; 0 until a plan is attached.
    pub final_sequence: u64,
    /// Highest instruction sequence the queue has confirmed durable.
    pub published_sequence: u64,
    /// Acknowledged watermark; monotonically non-decreasing, 0 = none.
    pub acked_sequence: u64,
    pub dispatch_attempts: u32,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    #[serde(skip)]
    uncommitted_events: Vec<JobEvent>,
}

impl Job {
    pub fn new(id: String, request: PlanRequest) -> Self {
        let now = Utc::now();
        let mut job = Self {
            id: id.clone(),
            request: request.clone(),
            state: JobState::Created,
            plan_id: None,
            final_sequence: 0,
            published_sequence: 0,
            acked_sequence: 0,
            dispatch_attempts: 0,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            version: 0,
            uncommitted_events: Vec::new(),
        };
        job.add_event(JobEvent::JobCreated {
            job_id: id,
            request,
            timestamp: now,
        });
        job
    }

    pub fn start_planning(&mut self) -> DomainResult<()> {
        self.expect_state(JobState::Created, "start planning")?;
        self.record(JobEvent::PlanningStarted {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        })
    }

    pub fn attach_plan(&mut self, plan: &PlannedPath, batch_size: usize) -> DomainResult<()> {
        self.expect_state(JobState::Planning, "attach a plan")?;
        if plan.waypoints.is_empty() {
            return Err(DomainError::InvalidCommand {
                reason: "planned path has no waypoints".to_string(),
            });
        }
        self.record(JobEvent::PlanReady {
            job_id: self.id.clone(),
            plan_id: plan.plan_id.clone(),
            map_version: plan.map_version,
            total_cost: plan.total_cost,
            final_sequence: plan.final_sequence(batch_size),
            timestamp: Utc::now(),
        })
    }

    pub fn start_dispatch(&mut self) -> DomainResult<()> {
        self.expect_state(JobState::Planned, "start dispatch")?;
        self.record(JobEvent::DispatchStarted {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        })
    }

    pub fn record_publish(&mut self, sequence: u64) -> DomainResult<()> {
        self.expect_state(JobState::Dispatching, "record a published instruction")?;
        if sequence != self.published_sequence + 1 {
            return Err(DomainError::InvalidCommand {
                reason: format!(
                    "instruction {} confirmed out of order, expected {}",
                    sequence,
                    self.published_sequence + 1
                ),
            });
        }
        self.record(JobEvent::InstructionConfirmed {
            job_id: self.id.clone(),
            sequence,
            timestamp: Utc::now(),
        })
    }

    pub fn finish_dispatch(&mut self) -> DomainResult<()> {
        self.expect_state(JobState::Dispatching, "finish dispatch")?;
        if self.published_sequence != self.final_sequence {
            return Err(DomainError::InvalidCommand {
                reason: format!(
                    "dispatch incomplete: {} of {} instructions confirmed",
                    self.published_sequence, self.final_sequence
                ),
            });
        }
        self.record(JobEvent::DispatchCompleted {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        })
    }

    /// Advance the acknowledged watermark. Returns `false` without
    /// recording anything when the ack is a duplicate or below the
    /// watermark; such deliveries are expected from an at-least-once
    /// transport and are dropped by the caller with a log line.
    pub fn record_ack(&mut self, sequence: u64) -> DomainResult<bool> {
        if !matches!(self.state, JobState::Dispatched | JobState::Executing) {
            return Err(DomainError::InvalidCommand {
                reason: format!("cannot acknowledge instructions in state {}", self.state),
            });
        }
        if sequence == 0 || sequence <= self.acked_sequence {
            return Ok(false);
        }
        if sequence > self.final_sequence {
            return Err(DomainError::InvalidCommand {
                reason: format!(
                    "acknowledged sequence {} exceeds final sequence {}",
                    sequence, self.final_sequence
                ),
            });
        }
        self.record(JobEvent::AckReceived {
            job_id: self.id.clone(),
            sequence,
            timestamp: Utc::now(),
        })?;
        Ok(true)
    }

    pub fn complete(&mut self) -> DomainResult<()> {
        self.expect_state(JobState::Executing, "complete execution")?;
        if self.acked_sequence != self.final_sequence {
            return Err(DomainError::IncompletePath {
                acked: self.acked_sequence,
                expected: self.final_sequence,
            });
        }
        self.record(JobEvent::JobCompleted {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        })
    }

    pub fn fail(&mut self, reason: FailureReason) -> DomainResult<()> {
        if self.state.is_terminal() {
            return Err(DomainError::InvalidCommand {
                reason: format!("cannot fail a job already in state {}", self.state),
            });
        }
        self.record(JobEvent::JobFailed {
            job_id: self.id.clone(),
            reason,
            timestamp: Utc::now(),
        })
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        if !self.state.is_cancellable() {
            return Err(DomainError::InvalidCommand {
                reason: format!("cannot cancel a job in state {}", self.state),
            });
        }
        self.record(JobEvent::JobCancelled {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        })
    }

    fn expect_state(&self, expected: JobState, action: &str) -> DomainResult<()> {
        if self.state != expected {
            return Err(DomainError::InvalidCommand {
                reason: format!(
                    "cannot {} in state {}, expected {}",
                    action, self.state, expected
                ),
            });
        }
        Ok(())
    }

    fn record(&mut self, event: JobEvent) -> DomainResult<()> {
        self.add_event(event.clone());
        self.apply(&event)
    }
}

impl AggregateRoot for Job {
    type Event = JobEvent;

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> DomainResult<()> {
        match event {
            JobEvent::JobCreated { .. } => {}
            JobEvent::PlanningStarted { .. } => {
                self.state = JobState::Planning;
            }
            JobEvent::PlanReady {
                plan_id,
                final_sequence,
                ..
            } => {
                self.plan_id = Some(plan_id.clone());
                self.final_sequence = *final_sequence;
                self.state = JobState::Planned;
            }
            JobEvent::DispatchStarted { .. } => {
                self.dispatch_attempts += 1;
                self.state = JobState::Dispatching;
            }
            JobEvent::InstructionConfirmed { sequence, .. } => {
                self.published_sequence = (*sequence).max(self.published_sequence);
            }
            JobEvent::DispatchCompleted { .. } => {
                self.state = JobState::Dispatched;
            }
            JobEvent::AckReceived { sequence, .. } => {
                self.acked_sequence = (*sequence).max(self.acked_sequence);
                self.state = JobState::Executing;
            }
            JobEvent::JobCompleted { .. } => {
                self.state = JobState::Completed;
            }
            JobEvent::JobFailed { reason, .. } => {
                self.failure_reason = Some(reason.clone());
                self.state = JobState::Failed;
            }
            JobEvent::JobCancelled { .. } => {
                self.state = JobState::Cancelled;
            }
        }
        self.updated_at = event.occurred_at();
        self.version += 1;
        Ok(())
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn mark_events_as_committed(&mut self) {
        self.uncommitted_events.clear();
    }

    fn add_event(&mut self, event: Self::Event) {
        self.uncommitted_events.push(event);
    }
}
