use plasterbot::common::{AggregateRoot, DomainError, DomainEvent, FailureReason};
use plasterbot::domains::job::{Job, JobEvent, JobState};
use plasterbot::domains::planning::{PlanGoal, PlanRequest, PlannedPath};
use plasterbot::domains::wall::Cell;

fn request() -> PlanRequest {
    PlanRequest {
        wall_id: "wall-1".to_string(),
        start: Cell::new(0, 0),
        goal: PlanGoal::Target(Cell::new(2, 0)),
        min_map_version: 1,
        idempotency_key: "key-1".to_string(),
    }
}

fn plan(waypoint_count: i32) -> PlannedPath {
    let cells: Vec<Cell> = (0..waypoint_count).map(|x| Cell::new(x, 0)).collect();
    PlannedPath::from_cells(
        "plan-1".to_string(),
        "wall-1".to_string(),
        1,
        cells,
        (waypoint_count.max(1) as u64 - 1) * 10,
    )
}

fn dispatched_job() -> Job {
    let mut job = Job::new("job-1".to_string(), request());
    job.start_planning().unwrap();
    job.attach_plan(&plan(3), 1).unwrap();
    job.start_dispatch().unwrap();
    for seq in 1..=3 {
        job.record_publish(seq).unwrap();
    }
    job.finish_dispatch().unwrap();
    job
}

#[cfg(test)]
mod state_machine_tests {
    use super::*;

    #[test]
    fn test_new_job_starts_created() {
        let job = Job::new("job-1".to_string(), request());
        assert_eq!(job.state, JobState::Created);
        assert_eq!(job.acked_sequence, 0);
        assert_eq!(job.uncommitted_events().len(), 1);
        assert!(matches!(
            job.uncommitted_events()[0],
            JobEvent::JobCreated { .. }
        ));
    }

    #[test]
    fn test_happy_path_to_completed() {
        let mut job = dispatched_job();
        assert_eq!(job.state, JobState::Dispatched);
        assert_eq!(job.published_sequence, 3);

        assert!(job.record_ack(1).unwrap());
        assert_eq!(job.state, JobState::Executing);
        assert!(job.record_ack(2).unwrap());
        assert!(job.record_ack(3).unwrap());
        job.complete().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn test_attach_plan_requires_planning_state() {
        let mut job = Job::new("job-1".to_string(), request());
        let result = job.attach_plan(&plan(3), 1);
        assert!(matches!(
            result.unwrap_err(),
            DomainError::InvalidCommand { .. }
        ));
    }

    #[test]
    fn test_attach_plan_rejects_empty_path() {
        let mut job = Job::new("job-1".to_string(), request());
        job.start_planning().unwrap();
        let empty = PlannedPath {
            plan_id: "plan-1".to_string(),
            wall_id: "wall-1".to_string(),
            map_version: 1,
            waypoints: Vec::new(),
            total_cost: 0,
        };
        assert!(job.attach_plan(&empty, 1).is_err());
    }

    #[test]
    fn test_publish_confirmations_must_be_in_order() {
        let mut job = Job::new("job-1".to_string(), request());
        job.start_planning().unwrap();
        job.attach_plan(&plan(3), 1).unwrap();
        job.start_dispatch().unwrap();

        assert!(job.record_publish(2).is_err());
        job.record_publish(1).unwrap();
        job.record_publish(2).unwrap();
        assert!(job.finish_dispatch().is_err()); // one message missing
        job.record_publish(3).unwrap();
        job.finish_dispatch().unwrap();
        assert_eq!(job.state, JobState::Dispatched);
    }

    #[test]
    fn test_dispatch_attempt_counter() {
        let mut job = Job::new("job-1".to_string(), request());
        job.start_planning().unwrap();
        job.attach_plan(&plan(3), 1).unwrap();
        assert_eq!(job.dispatch_attempts, 0);
        job.start_dispatch().unwrap();
        assert_eq!(job.dispatch_attempts, 1);
    }

    #[test]
    fn test_cancel_windows() {
        let mut job = Job::new("job-1".to_string(), request());
        assert!(job.state.is_cancellable());
        job.start_planning().unwrap();
        assert!(job.state.is_cancellable());
        job.attach_plan(&plan(3), 1).unwrap();
        assert!(job.state.is_cancellable());

        job.start_dispatch().unwrap();
        let result = job.cancel();
        assert!(matches!(
            result.unwrap_err(),
            DomainError::InvalidCommand { .. }
        ));
        assert_eq!(job.state, JobState::Dispatching);
    }

    #[test]
    fn test_cancel_before_dispatch() {
        let mut job = Job::new("job-1".to_string(), request());
        job.start_planning().unwrap();
        job.cancel().unwrap();
        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.state.is_terminal());
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let mut created = Job::new("job-1".to_string(), request());
        created.fail(FailureReason::WallNotFound).unwrap();
        assert_eq!(created.state, JobState::Failed);
        assert_eq!(created.failure_reason, Some(FailureReason::WallNotFound));

        let mut dispatched = dispatched_job();
        dispatched.fail(FailureReason::ExecutionTimeout).unwrap();
        assert_eq!(dispatched.state, JobState::Failed);

        // Terminal states cannot fail again.
        assert!(dispatched.fail(FailureReason::ExecutionTimeout).is_err());
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut job = dispatched_job();
        for seq in 1..=3 {
            job.record_ack(seq).unwrap();
        }
        job.complete().unwrap();
        assert!(job.cancel().is_err());
        assert!(job.fail(FailureReason::Fault("x".to_string())).is_err());
    }
}

#[cfg(test)]
mod watermark_tests {
    use super::*;

    #[test]
    fn test_watermark_is_monotonic_under_any_interleaving() {
        let mut job = dispatched_job();

        assert!(job.record_ack(1).unwrap());
        assert_eq!(job.acked_sequence, 1);

        // Out-of-order jump forward is accepted.
        assert!(job.record_ack(3).unwrap());
        assert_eq!(job.acked_sequence, 3);

        // Duplicates and acks below the watermark are dropped.
        assert!(!job.record_ack(2).unwrap());
        assert!(!job.record_ack(3).unwrap());
        assert!(!job.record_ack(1).unwrap());
        assert_eq!(job.acked_sequence, 3);
    }

    #[test]
    fn test_ack_beyond_final_sequence_is_rejected() {
        let mut job = dispatched_job();
        assert!(job.record_ack(4).is_err());
    }

    #[test]
    fn test_ack_before_dispatch_is_rejected() {
        let mut job = Job::new("job-1".to_string(), request());
        assert!(job.record_ack(1).is_err());
    }

    #[test]
    fn test_complete_requires_full_watermark() {
        let mut job = dispatched_job();
        job.record_ack(1).unwrap();
        job.record_ack(2).unwrap();

        match job.complete().unwrap_err() {
            DomainError::IncompletePath { acked, expected } => {
                assert_eq!(acked, 2);
                assert_eq!(expected, 3);
            }
            other => panic!("expected IncompletePath, got {:?}", other),
        }
        // Still awaiting the missing ack.
        assert_eq!(job.state, JobState::Executing);

        job.record_ack(3).unwrap();
        job.complete().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    #[test]
    fn test_events_are_recorded_for_each_transition() {
        let job = dispatched_job();
        let types: Vec<&str> = job
            .uncommitted_events()
            .iter()
            .map(|e| e.event_type())
            .collect();
        assert_eq!(
            types,
            vec![
                "JobCreated",
                "PlanningStarted",
                "PlanReady",
                "DispatchStarted",
                "InstructionConfirmed",
                "InstructionConfirmed",
                "InstructionConfirmed",
                "DispatchCompleted",
            ]
        );
        for event in job.uncommitted_events() {
            assert_eq!(event.aggregate_id(), "job-1");
        }
    }

    #[test]
    fn test_mark_events_as_committed() {
        let mut job = Job::new("job-1".to_string(), request());
        assert_eq!(job.uncommitted_events().len(), 1);
        job.mark_events_as_committed();
        assert_eq!(job.uncommitted_events().len(), 0);
    }

    #[test]
    fn test_job_snapshot_round_trip() {
        let mut job = dispatched_job();
        job.record_ack(2).unwrap();

        let serialized = serde_json::to_string(&job).unwrap();
        let reloaded: Job = serde_json::from_str(&serialized).unwrap();

        assert_eq!(reloaded.state, JobState::Executing);
        assert_eq!(reloaded.acked_sequence, 2);
        assert_eq!(reloaded.final_sequence, 3);
        assert_eq!(reloaded.published_sequence, 3);
        assert_eq!(reloaded.plan_id, job.plan_id);
        // Uncommitted events never survive the snapshot.
        assert_eq!(reloaded.uncommitted_events().len(), 0);
    }

    #[test]
    fn test_job_event_serialization() {
        let events = dispatched_job().uncommitted_events().to_vec();
        for event in events {
            let serialized = serde_json::to_string(&event).unwrap();
            let deserialized: JobEvent = serde_json::from_str(&serialized).unwrap();
            assert_eq!(
                std::mem::discriminant(&event),
                std::mem::discriminant(&deserialized)
            );
        }
    }
}
