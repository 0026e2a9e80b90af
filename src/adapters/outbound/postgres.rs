use crate::common::StateStore;
use crate::config::PostgresConfig;
use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

/// PostgreSQL-backed state store: one JSONB document per key, upserted on
/// every write.
pub struct PostgresStateStore {
    pool: Pool,
}

impl PostgresStateStore {
    pub async fn new(config: PostgresConfig) -> Result<Self, String> {
        let mut pg_config = Config::new();
        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| format!("Failed to create PostgreSQL pool: {}", e))?;

        let store = Self { pool };

        // Initialize database schema
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Failed to get database connection: {}", e))?;

        let schema = r#"
            CREATE TABLE IF NOT EXISTS service_state (
                key VARCHAR(512) PRIMARY KEY,
                value JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_service_state_prefix
            ON service_state(key text_pattern_ops);
        "#;

        client
            .batch_execute(schema)
            .await
            .map_err(|e| format!("Failed to initialize database schema: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Failed to get database connection: {}", e))?;

        let row = client
            .query_opt("SELECT value FROM service_state WHERE key = $1", &[&key])
            .await
            .map_err(|e| format!("Failed to read key {}: {}", key, e))?;

        Ok(row.map(|r| r.get::<_, serde_json::Value>(0)))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Failed to get database connection: {}", e))?;

        client
            .execute(
                "INSERT INTO service_state (key, value, updated_at)
                 VALUES ($1, $2, NOW())
                 ON CONFLICT (key) DO UPDATE SET
                 value = EXCLUDED.value,
                 updated_at = EXCLUDED.updated_at",
                &[&key, &value],
            )
            .await
            .map_err(|e| format!("Failed to write key {}: {}", key, e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Failed to get database connection: {}", e))?;

        client
            .execute("DELETE FROM service_state WHERE key = $1", &[&key])
            .await
            .map_err(|e| format!("Failed to delete key {}: {}", key, e))?;

        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Failed to get database connection: {}", e))?;

        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let rows = client
            .query(
                "SELECT key FROM service_state WHERE key LIKE $1",
                &[&pattern],
            )
            .await
            .map_err(|e| format!("Failed to list keys under {}: {}", prefix, e))?;

        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }
}
