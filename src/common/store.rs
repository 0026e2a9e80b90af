use async_trait::async_trait;
use std::time::Duration;

/// Durable key-value persistence port. Values are JSON documents; the key
/// scheme is `wall:{wallId}`, `obstacleMap:{wallId}:{version}`, `job:{jobId}`,
/// `plan:{planId}`, `idem:{idempotencyKey}`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, String>;
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), String>;
    async fn delete(&self, key: &str) -> Result<(), String>;
    /// Keys currently present under the given prefix, in unspecified order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, String>;
}

/// Low-latency cache port with per-entry TTL. Entries may vanish at any
/// time; callers must treat a miss as "fetch from the durable store".
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, String>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), String>;
    async fn delete(&self, key: &str) -> Result<(), String>;
}
