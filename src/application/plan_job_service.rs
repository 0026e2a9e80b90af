use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::common::{
    ApplicationError, ApplicationResult, DomainError, FailureReason,
};
use crate::domains::job::{Job, JobState};
use crate::domains::planning::{PathPlanner, PlanRequest, PlannedPath};

use super::dispatch_service::InstructionDispatcher;
use super::locks::JobLocks;
use super::obstacle_service::ObstacleCacheService;
use super::repository::StateRepository;

/// Job view returned to callers of `submit`/`cancel`/`status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub planned_path: Option<PlannedPath>,
    pub failure_reason: Option<FailureReason>,
    pub acked_sequence: u64,
    pub final_sequence: u64,
}

/// Orchestrates one planning request end-to-end: dedup, job creation,
/// planning against a pinned obstacle snapshot, plan persistence and the
/// hand-off to the dispatcher. Every transition is persisted before the
/// pipeline takes its next step; planning and cache failures are resolved
/// into a `Failed` job with a recorded reason, never thrown to the caller.
pub struct PlanJobService {
    repo: Arc<StateRepository>,
    obstacles: Arc<ObstacleCacheService>,
    planner: PathPlanner,
    dispatcher: Arc<InstructionDispatcher>,
    locks: Arc<JobLocks>,
    /// Held only for the dedup-check-and-create step of submit, making
    /// "exactly one job per idempotency key" hold under concurrent
    /// submission.
    submission_gate: Mutex<()>,
    dedup_window: chrono::Duration,
    batch_size: usize,
}

impl PlanJobService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<StateRepository>,
        obstacles: Arc<ObstacleCacheService>,
        planner: PathPlanner,
        dispatcher: Arc<InstructionDispatcher>,
        locks: Arc<JobLocks>,
        dedup_window: chrono::Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            repo,
            obstacles,
            planner,
            dispatcher,
            locks,
            submission_gate: Mutex::new(()),
            dedup_window,
            batch_size: batch_size.max(1),
        }
    }

    /// Submit a planning request. Requests that fail validation are
    /// rejected before any job state exists; a duplicate idempotency key
    /// returns the existing job instead of creating a second one.
    pub async fn submit(&self, request: PlanRequest) -> ApplicationResult<JobStatus> {
        let surface = self.obstacles.get_surface(&request.wall_id).await?;
        request.validate(&surface).map_err(ApplicationError::from)?;

        let job_id = {
            let _gate = self.submission_gate.lock().await;
            if let Some(existing) = self.dedup(&request).await? {
                return Ok(existing);
            }
            let mut job = Job::new(Uuid::new_v4().to_string(), request.clone());
            self.repo
                .idempotency_record(&request.idempotency_key, &job.id)
                .await?;
            self.repo.save_job(&mut job).await?;
            tracing::info!(
                "job {} created for wall {} (idempotency key {})",
                job.id,
                request.wall_id,
                request.idempotency_key
            );
            job.id
        };

        self.run_pipeline(&job_id, &request).await?;
        self.status(&job_id).await
    }

    /// Cancel a job. Permitted only before dispatch begins; the race with
    /// an in-flight dispatch is settled by the dispatcher re-checking the
    /// state under this same per-job lock before publishing.
    pub async fn cancel(&self, job_id: &str) -> ApplicationResult<JobStatus> {
        {
            let _guard = self.locks.acquire(job_id).await;
            let mut job = self.repo.load_job(job_id).await?;
            job.cancel()?;
            self.repo.save_job(&mut job).await?;
        }
        tracing::info!("job {} cancelled", job_id);
        self.status(job_id).await
    }

    pub async fn status(&self, job_id: &str) -> ApplicationResult<JobStatus> {
        let job = self.repo.load_job(job_id).await?;
        let planned_path = match &job.plan_id {
            Some(plan_id) => Some(self.repo.load_plan(plan_id).await?),
            None => None,
        };
        Ok(JobStatus {
            job_id: job.id.clone(),
            state: job.state,
            planned_path,
            failure_reason: job.failure_reason.clone(),
            acked_sequence: job.acked_sequence,
            final_sequence: job.final_sequence,
        })
    }

    pub async fn job_count(&self) -> ApplicationResult<usize> {
        Ok(self.repo.job_ids().await?.len())
    }

    /// Crash recovery: re-run dispatch for every job the process left in
    /// `Dispatching`. Publishing resumes after the highest confirmed
    /// sequence, so already-accepted instructions are not duplicated.
    pub async fn resume_interrupted_dispatches(
        &self,
        dispatcher: &InstructionDispatcher,
    ) -> ApplicationResult<usize> {
        let mut resumed = 0;
        for job_id in self.repo.job_ids().await? {
            let Some(job) = self.repo.try_load_job(&job_id).await? else {
                continue;
            };
            if job.state == JobState::Dispatching {
                tracing::info!(
                    "resuming dispatch of job {} from sequence {}",
                    job_id,
                    job.published_sequence + 1
                );
                dispatcher.dispatch(&job_id).await?;
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    async fn dedup(&self, request: &PlanRequest) -> ApplicationResult<Option<JobStatus>> {
        let Some(job_id) = self
            .repo
            .idempotency_lookup(&request.idempotency_key)
            .await?
        else {
            return Ok(None);
        };
        let Some(job) = self.repo.try_load_job(&job_id).await? else {
            return Ok(None);
        };
        let recently_terminal = job.state.is_terminal()
            && Utc::now().signed_duration_since(job.updated_at) <= self.dedup_window;
        if !job.state.is_terminal() || recently_terminal {
            if job.request != *request {
                return Err(ApplicationError::Domain(DomainError::Conflict {
                    reason: format!(
                        "idempotency key {} is bound to job {} with a different request",
                        request.idempotency_key, job_id
                    ),
                }));
            }
            tracing::debug!(
                "request deduplicated onto existing job {} (key {})",
                job_id,
                request.idempotency_key
            );
            return Ok(Some(self.status(&job_id).await?));
        }
        Ok(None)
    }

    /// Drive a freshly created job through planning and dispatch. A cancel
    /// arriving between transitions simply ends the pipeline: the next
    /// transition finds the job no longer in the expected state.
    async fn run_pipeline(&self, job_id: &str, request: &PlanRequest) -> ApplicationResult<()> {
        if !self.transition(job_id, JobState::Created, Job::start_planning).await? {
            return Ok(());
        }

        // Snapshot + search run outside the job lock; only transitions are
        // serialized.
        let surface = self.obstacles.get_surface(&request.wall_id).await?;
        let map = match self
            .obstacles
            .get_map(&request.wall_id, request.min_map_version)
            .await
        {
            Ok(map) => map,
            Err(err) => {
                let reason = match &err {
                    ApplicationError::Domain(DomainError::NotFound { .. }) => {
                        FailureReason::WallNotFound
                    }
                    ApplicationError::Domain(DomainError::Stale { .. }) => {
                        FailureReason::StaleObstacles
                    }
                    _ => FailureReason::ServiceUnavailable,
                };
                tracing::warn!("planning aborted for job {}: {}", job_id, err);
                self.fail_job(job_id, reason).await?;
                return Ok(());
            }
        };

        let plan = match self.planner.plan(&surface, map, request) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!("planner failed for job {}: {}", job_id, err);
                self.fail_job(job_id, FailureReason::from_planning(&err)).await?;
                return Ok(());
            }
        };

        // Plan persisted before the job references it.
        self.repo.save_plan(&plan).await?;
        let attached = self
            .transition(job_id, JobState::Planning, |job| {
                job.attach_plan(&plan, self.batch_size)
            })
            .await?;
        if !attached {
            return Ok(());
        }

        self.dispatcher.dispatch(job_id).await?;
        Ok(())
    }

    /// Apply one state-machine command under the job lock. Returns false
    /// when the job has left `expected` (e.g. a cancel slipped in), which
    /// ends the pipeline without an error.
    async fn transition<F>(
        &self,
        job_id: &str,
        expected: JobState,
        command: F,
    ) -> ApplicationResult<bool>
    where
        F: FnOnce(&mut Job) -> crate::common::DomainResult<()>,
    {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.repo.load_job(job_id).await?;
        if job.state != expected {
            tracing::debug!(
                "pipeline for job {} stopped: state {} (expected {})",
                job_id,
                job.state,
                expected
            );
            return Ok(false);
        }
        command(&mut job)?;
        self.repo.save_job(&mut job).await?;
        Ok(true)
    }

    async fn fail_job(&self, job_id: &str, reason: FailureReason) -> ApplicationResult<()> {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.repo.load_job(job_id).await?;
        if job.state.is_terminal() {
            return Ok(());
        }
        job.fail(reason)?;
        self.repo.save_job(&mut job).await
    }
}
