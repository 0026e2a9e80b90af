use std::sync::Arc;

use crate::common::{
    AggregateRoot, ApplicationError, ApplicationResult, DomainError, EventEnvelope, EventMetadata,
    EventStore, StateStore,
};
use crate::domains::job::Job;
use crate::domains::planning::PlannedPath;
use crate::domains::wall::{ObstacleMap, WallEvent, WallSurface};

pub fn wall_key(wall_id: &str) -> String {
    format!("wall:{}", wall_id)
}

pub fn obstacle_map_key(wall_id: &str, version: u64) -> String {
    format!("obstacleMap:{}:{}", wall_id, version)
}

fn obstacle_latest_key(wall_id: &str) -> String {
    format!("obstacleMap:{}:latest", wall_id)
}

pub fn job_key(job_id: &str) -> String {
    format!("job:{}", job_id)
}

pub fn plan_key(plan_id: &str) -> String {
    format!("plan:{}", plan_id)
}

fn idem_key(idempotency_key: &str) -> String {
    format!("idem:{}", idempotency_key)
}

/// Typed access to the durable key-value store plus the audit event log.
/// Every job state transition is written here before the pipeline takes
/// its next step, so a restarted process resumes from the last persisted
/// state.
pub struct StateRepository {
    store: Arc<dyn StateStore>,
    events: Arc<dyn EventStore>,
}

impl StateRepository {
    pub fn new(store: Arc<dyn StateStore>, events: Arc<dyn EventStore>) -> Self {
        Self { store, events }
    }

    pub async fn save_wall(&self, surface: &WallSurface) -> ApplicationResult<()> {
        self.put_json(&wall_key(&surface.id), surface).await
    }

    pub async fn load_wall(&self, wall_id: &str) -> ApplicationResult<WallSurface> {
        self.get_json(&wall_key(wall_id))
            .await?
            .ok_or_else(|| not_found("wall", wall_id))
    }

    pub async fn save_obstacle_map(&self, map: &ObstacleMap) -> ApplicationResult<()> {
        self.put_json(&obstacle_map_key(&map.wall_id, map.version), map)
            .await?;
        self.put_json(&obstacle_latest_key(&map.wall_id), &map.version)
            .await
    }

    pub async fn load_obstacle_map(
        &self,
        wall_id: &str,
        version: u64,
    ) -> ApplicationResult<ObstacleMap> {
        self.get_json(&obstacle_map_key(wall_id, version))
            .await?
            .ok_or_else(|| not_found("obstacle map", &format!("{}:{}", wall_id, version)))
    }

    pub async fn latest_obstacle_version(&self, wall_id: &str) -> ApplicationResult<Option<u64>> {
        self.get_json(&obstacle_latest_key(wall_id)).await
    }

    pub async fn save_plan(&self, plan: &PlannedPath) -> ApplicationResult<()> {
        self.put_json(&plan_key(&plan.plan_id), plan).await
    }

    pub async fn load_plan(&self, plan_id: &str) -> ApplicationResult<PlannedPath> {
        self.get_json(&plan_key(plan_id))
            .await?
            .ok_or_else(|| not_found("plan", plan_id))
    }

    /// Persist the job snapshot, then append its uncommitted events to the
    /// audit log. The snapshot write is the one crash recovery depends on.
    pub async fn save_job(&self, job: &mut Job) -> ApplicationResult<()> {
        self.put_json(&job_key(&job.id), job).await?;

        let mut envelopes = Vec::with_capacity(job.uncommitted_events().len());
        for event in job.uncommitted_events() {
            envelopes.push(
                EventEnvelope::new(event, "Job", EventMetadata::from_source("plasterbot"))
                    .map_err(DomainError::from)?,
            );
        }
        if !envelopes.is_empty() {
            self.events
                .append_events(&job.id, envelopes)
                .await
                .map_err(ApplicationError::EventStore)?;
        }
        job.mark_events_as_committed();
        Ok(())
    }

    pub async fn append_wall_event(&self, event: &WallEvent) -> ApplicationResult<()> {
        let envelope = EventEnvelope::new(event, "Wall", EventMetadata::from_source("plasterbot"))
            .map_err(DomainError::from)?;
        let aggregate_id = envelope.aggregate_id.clone();
        self.events
            .append_events(&aggregate_id, vec![envelope])
            .await
            .map_err(ApplicationError::EventStore)
    }

    pub async fn load_job(&self, job_id: &str) -> ApplicationResult<Job> {
        self.try_load_job(job_id)
            .await?
            .ok_or_else(|| not_found("job", job_id))
    }

    pub async fn try_load_job(&self, job_id: &str) -> ApplicationResult<Option<Job>> {
        self.get_json(&job_key(job_id)).await
    }

    pub async fn job_ids(&self) -> ApplicationResult<Vec<String>> {
        let keys = self
            .store
            .keys("job:")
            .await
            .map_err(ApplicationError::StateStore)?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix("job:").map(str::to_string))
            .collect())
    }

    pub async fn idempotency_lookup(&self, key: &str) -> ApplicationResult<Option<String>> {
        self.get_json(&idem_key(key)).await
    }

    pub async fn idempotency_record(&self, key: &str, job_id: &str) -> ApplicationResult<()> {
        self.put_json(&idem_key(key), &job_id.to_string()).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> ApplicationResult<Option<T>> {
        let value = self
            .store
            .get(key)
            .await
            .map_err(ApplicationError::StateStore)?;
        match value {
            Some(value) => {
                let typed = serde_json::from_value(value).map_err(DomainError::from)?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    async fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> ApplicationResult<()> {
        let json = serde_json::to_value(value).map_err(DomainError::from)?;
        self.store
            .put(key, json)
            .await
            .map_err(ApplicationError::StateStore)
    }
}

fn not_found(resource: &'static str, id: &str) -> ApplicationError {
    ApplicationError::Domain(DomainError::NotFound {
        resource,
        id: id.to_string(),
    })
}
