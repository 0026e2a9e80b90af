use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-job exclusive sections. Every state transition for a job happens
/// under its lock, so concurrent cancel/dispatch/ack handling cannot
/// interleave inconsistently. Jobs for different walls (or different jobs
/// on the same wall) proceed in parallel.
#[derive(Default)]
pub struct JobLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, job_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(job_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
