use crate::common::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory TTL cache standing in for the external cache server. Expired
/// entries are dropped lazily on read.
#[derive(Default)]
pub struct InMemoryTtlCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryTtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Entry found but expired.
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), String> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
