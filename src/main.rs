use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use plasterbot::adapters::inbound::{InMemoryEventStore, InMemoryStateStore, InMemoryTtlCache};
use plasterbot::adapters::outbound::{spawn_ack_consumer, KafkaInstructionQueue, PostgresStateStore};
use plasterbot::application::{
    ExecutionTracker, InstructionDispatcher, JobLocks, ObstacleCacheService, PlanJobService,
    StateRepository,
};
use plasterbot::common::{EventStore, RetryPolicy, StateStore};
use plasterbot::domains::planning::PathPlanner;
use plasterbot::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting plasterbot");

    let config = match Config::from_file("config.toml").await {
        Ok(config) => config,
        Err(err) => {
            warn!("config.toml not loaded ({}), using defaults", err);
            Config::default()
        }
    };
    info!("Kafka brokers: {:?}", config.kafka.brokers);
    info!("PostgreSQL host: {}", config.postgres.host);

    let store: Arc<dyn StateStore> = match PostgresStateStore::new(config.postgres.clone()).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            warn!("PostgreSQL unavailable ({}), falling back to in-memory state", err);
            Arc::new(InMemoryStateStore::new())
        }
    };
    let events: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    let repo = Arc::new(StateRepository::new(store, events));
    let locks = Arc::new(JobLocks::new());

    let obstacles = Arc::new(ObstacleCacheService::new(
        repo.clone(),
        Arc::new(InMemoryTtlCache::new()),
        Duration::from_secs(config.cache.obstacle_ttl_seconds),
        RetryPolicy::default(),
    ));

    let queue = Arc::new(KafkaInstructionQueue::new(&config.kafka)?);
    let dispatcher = Arc::new(InstructionDispatcher::new(
        repo.clone(),
        queue,
        locks.clone(),
        RetryPolicy::new(
            config.dispatch.max_publish_attempts,
            config.dispatch.retry_base_delay_ms,
            config.dispatch.retry_max_delay_ms,
        ),
        config.dispatch.batch_size,
    ));

    let jobs = Arc::new(PlanJobService::new(
        repo.clone(),
        obstacles.clone(),
        PathPlanner::new(config.planner.expansion_budget),
        dispatcher.clone(),
        locks.clone(),
        chrono::Duration::seconds(config.tracker.dedup_window_seconds as i64),
        config.dispatch.batch_size,
    ));
    info!(
        "plan job service ready ({} jobs persisted)",
        jobs.job_count().await.unwrap_or(0)
    );

    // Crash recovery: jobs that were mid-dispatch when the process died
    // resume from their highest confirmed sequence.
    match jobs.resume_interrupted_dispatches(&dispatcher).await {
        Ok(0) => {}
        Ok(resumed) => info!("resumed {} interrupted dispatches", resumed),
        Err(err) => error!("dispatch recovery failed: {}", err),
    }

    let tracker = Arc::new(ExecutionTracker::new(
        repo,
        locks,
        chrono::Duration::seconds(config.tracker.execution_timeout_seconds as i64),
    ));

    let (ack_sender, ack_receiver) = mpsc::channel(256);
    match spawn_ack_consumer(&config.kafka, ack_sender) {
        Ok(_handle) => info!("acknowledgment consumer subscribed"),
        Err(err) => error!("failed to start acknowledgment consumer: {}", err),
    }

    let sweep_every = Duration::from_secs(config.tracker.sweep_interval_seconds);
    let tracker_task = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.run(ack_receiver, sweep_every).await })
    };

    info!("plasterbot started successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down plasterbot");
    tracker_task.abort();

    Ok(())
}
