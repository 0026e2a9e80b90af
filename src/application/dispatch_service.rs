use std::sync::Arc;

use crate::common::{ApplicationResult, FailureReason, RetryPolicy};
use crate::domains::job::{InstructionMessage, InstructionQueue, JobState};
use crate::domains::planning::PlannedPath;

use super::locks::JobLocks;
use super::repository::StateRepository;

/// Serializes a planned path into the ordered instruction stream and
/// publishes it with publisher-confirm semantics.
///
/// The per-job lock is taken for state checks and watermark persistence,
/// never across a publish await. Publishing resumes after the highest
/// already-confirmed sequence, so a crash mid-dispatch does not duplicate
/// instructions (beyond transport-level redelivery, which the robot
/// absorbs via the idempotency token).
pub struct InstructionDispatcher {
    repo: Arc<StateRepository>,
    queue: Arc<dyn InstructionQueue>,
    locks: Arc<JobLocks>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl InstructionDispatcher {
    pub fn new(
        repo: Arc<StateRepository>,
        queue: Arc<dyn InstructionQueue>,
        locks: Arc<JobLocks>,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            repo,
            queue,
            locks,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    /// Publish every remaining instruction for the job. Returns the job
    /// state after dispatch; a lost cancel race or an exhausted transport
    /// is reported through that state, not as an error.
    pub async fn dispatch(&self, job_id: &str) -> ApplicationResult<JobState> {
        // State check under the job lock, immediately before publishing:
        // a cancel that won the race ends dispatch here.
        let (plan_id, start_after) = {
            let _guard = self.locks.acquire(job_id).await;
            let mut job = self.repo.load_job(job_id).await?;
            match job.state {
                JobState::Cancelled => {
                    tracing::info!("job {} cancelled before dispatch, nothing published", job_id);
                    return Ok(JobState::Cancelled);
                }
                JobState::Planned => {
                    job.start_dispatch()?;
                    self.repo.save_job(&mut job).await?;
                }
                JobState::Dispatching => {
                    // Resuming after a crash; the published watermark below
                    // skips everything already confirmed.
                }
                other => {
                    tracing::warn!("job {} not dispatchable in state {}", job_id, other);
                    return Ok(other);
                }
            }
            let plan_id = job.plan_id.clone().ok_or_else(|| {
                crate::common::DomainError::InvalidCommand {
                    reason: format!("job {} has no plan attached", job_id),
                }
            })?;
            (plan_id, job.published_sequence)
        };

        let plan = self.repo.load_plan(&plan_id).await?;
        let messages = self.build_messages(job_id, &plan);

        for message in messages.iter().filter(|m| m.sequence > start_after) {
            let outcome = self
                .retry
                .run("publish instruction", || async move {
                    self.queue.publish(message).await
                })
                .await;
            match outcome {
                Ok(()) => {
                    let _guard = self.locks.acquire(job_id).await;
                    let mut job = self.repo.load_job(job_id).await?;
                    job.record_publish(message.sequence)?;
                    self.repo.save_job(&mut job).await?;
                }
                Err((attempts, err)) => {
                    tracing::error!(
                        "giving up on instruction {} for job {} after {} attempts: {}",
                        message.sequence,
                        job_id,
                        attempts,
                        err
                    );
                    let _guard = self.locks.acquire(job_id).await;
                    let mut job = self.repo.load_job(job_id).await?;
                    job.fail(FailureReason::DispatchFailure)?;
                    self.repo.save_job(&mut job).await?;
                    return Ok(JobState::Failed);
                }
            }
        }

        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.repo.load_job(job_id).await?;
        job.finish_dispatch()?;
        self.repo.save_job(&mut job).await?;
        tracing::info!(
            "job {} dispatched: {} instructions on the wire",
            job_id,
            job.final_sequence
        );
        Ok(job.state)
    }

    /// The full instruction stream for a plan: waypoint batches with
    /// strictly increasing sequence numbers, last one flagged final.
    pub fn build_messages(&self, job_id: &str, plan: &PlannedPath) -> Vec<InstructionMessage> {
        let batches: Vec<&[_]> = plan.waypoints.chunks(self.batch_size).collect();
        let count = batches.len();
        batches
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let sequence = (i + 1) as u64;
                InstructionMessage {
                    job_id: job_id.to_string(),
                    sequence,
                    idempotency_token: InstructionMessage::token(job_id, sequence),
                    waypoints: chunk.to_vec(),
                    is_final: i + 1 == count,
                }
            })
            .collect()
    }
}
