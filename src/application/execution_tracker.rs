use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::common::{ApplicationError, ApplicationResult, FailureReason};
use crate::domains::job::{AckEvent, AckMessage, JobState};

use super::locks::JobLocks;
use super::repository::StateRepository;

/// Consumes acknowledgment events from the robot and drives jobs to a
/// terminal state. A pure state-transition function over received events:
/// duplicate and out-of-order delivery from the transport is absorbed by
/// the watermark, independent of any ordering guarantee.
pub struct ExecutionTracker {
    repo: Arc<StateRepository>,
    locks: Arc<JobLocks>,
    execution_timeout: Duration,
}

impl ExecutionTracker {
    pub fn new(repo: Arc<StateRepository>, locks: Arc<JobLocks>, execution_timeout: Duration) -> Self {
        Self {
            repo,
            locks,
            execution_timeout,
        }
    }

    /// Long-running consumption loop, one logical subscriber per
    /// deployment. Ends when the ack channel closes; the periodic tick
    /// sweeps for jobs whose execution stalled.
    pub async fn run(&self, mut acks: mpsc::Receiver<AckMessage>, sweep_every: std::time::Duration) {
        let mut ticker = tokio::time::interval(sweep_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                message = acks.recv() => {
                    match message {
                        Some(message) => {
                            if let Err(err) = self.handle(&message).await {
                                tracing::warn!(
                                    "ack handling failed for job {}: {}",
                                    message.job_id,
                                    err
                                );
                            }
                        }
                        None => {
                            tracing::info!("ack channel closed, execution tracker stopping");
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep_timeouts(Utc::now()).await {
                        tracing::warn!("execution timeout sweep failed: {}", err);
                    }
                }
            }
        }
    }

    pub async fn handle(&self, message: &AckMessage) -> ApplicationResult<()> {
        match message.event {
            AckEvent::Ack => self.on_ack(&message.job_id, message.sequence).await,
            AckEvent::Complete => self.on_complete(&message.job_id).await,
            AckEvent::Fault => {
                let reason = message
                    .reason
                    .clone()
                    .unwrap_or_else(|| "unspecified".to_string());
                self.on_fault(&message.job_id, reason).await
            }
        }
    }

    /// Advance the acknowledged watermark to `max(current, sequence)`.
    /// Duplicates and acks below the watermark are dropped with a log
    /// line, not an error.
    pub async fn on_ack(&self, job_id: &str, sequence: u64) -> ApplicationResult<()> {
        let _guard = self.locks.acquire(job_id).await;
        let Some(mut job) = self.repo.try_load_job(job_id).await? else {
            tracing::debug!("ack for unknown job {} dropped", job_id);
            return Ok(());
        };
        if job.state.is_terminal() {
            tracing::debug!("ack for terminal job {} dropped", job_id);
            return Ok(());
        }
        if job.record_ack(sequence)? {
            self.repo.save_job(&mut job).await?;
        } else {
            tracing::debug!(
                "duplicate/out-of-order ack {} for job {} dropped (watermark {})",
                sequence,
                job_id,
                job.acked_sequence
            );
        }
        Ok(())
    }

    /// Completion requires every instruction acknowledged; otherwise the
    /// job stays in `Executing` awaiting the missing acks (or the timeout
    /// sweep).
    pub async fn on_complete(&self, job_id: &str) -> ApplicationResult<()> {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.repo.load_job(job_id).await?;
        if job.state.is_terminal() {
            tracing::debug!("completion for terminal job {} dropped", job_id);
            return Ok(());
        }
        job.complete()?;
        self.repo.save_job(&mut job).await?;
        tracing::info!("job {} completed", job_id);
        Ok(())
    }

    pub async fn on_fault(&self, job_id: &str, reason: String) -> ApplicationResult<()> {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.repo.load_job(job_id).await?;
        if job.state.is_terminal() {
            tracing::debug!("fault for terminal job {} dropped", job_id);
            return Ok(());
        }
        job.fail(FailureReason::Fault(reason))?;
        self.repo.save_job(&mut job).await?;
        tracing::warn!("job {} failed on robot fault", job_id);
        Ok(())
    }

    /// Fail jobs stuck in `Dispatched`/`Executing` with no ack progress
    /// past the configured deadline.
    pub async fn sweep_timeouts(&self, now: DateTime<Utc>) -> ApplicationResult<()> {
        for job_id in self.repo.job_ids().await? {
            let _guard = self.locks.acquire(&job_id).await;
            let Some(mut job) = self.repo.try_load_job(&job_id).await? else {
                continue;
            };
            if !matches!(job.state, JobState::Dispatched | JobState::Executing) {
                continue;
            }
            if now.signed_duration_since(job.updated_at) > self.execution_timeout {
                tracing::warn!(
                    "job {} timed out in state {} (watermark {} of {})",
                    job_id,
                    job.state,
                    job.acked_sequence,
                    job.final_sequence
                );
                job.fail(FailureReason::ExecutionTimeout)
                    .map_err(ApplicationError::from)?;
                self.repo.save_job(&mut job).await?;
            }
        }
        Ok(())
    }
}
