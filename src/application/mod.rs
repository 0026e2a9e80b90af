pub mod dispatch_service;
pub mod execution_tracker;
pub mod locks;
pub mod obstacle_service;
pub mod plan_job_service;
pub mod repository;

pub use dispatch_service::InstructionDispatcher;
pub use execution_tracker::ExecutionTracker;
pub use locks::JobLocks;
pub use obstacle_service::ObstacleCacheService;
pub use plan_job_service::{JobStatus, PlanJobService};
pub use repository::StateRepository;
