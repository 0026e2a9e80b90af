use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub postgres: PostgresConfig,
    pub cache: CacheConfig,
    pub planner: PlannerConfig,
    pub dispatch: DispatchConfig,
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub group_id: String,
    pub topics: KafkaTopics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaTopics {
    pub robot_instructions: String,
    pub robot_acknowledgments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub obstacle_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum frontier pops per planner invocation; bounds worst-case
    /// latency on pathological maps.
    pub expansion_budget: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Waypoints per instruction message.
    pub batch_size: usize,
    pub max_publish_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub execution_timeout_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub dedup_window_seconds: u64,
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka: KafkaConfig {
                brokers: vec!["localhost:9092".to_string()],
                client_id: "plasterbot".to_string(),
                group_id: "plasterbot-group".to_string(),
                topics: KafkaTopics {
                    robot_instructions: "robot-instructions".to_string(),
                    robot_acknowledgments: "robot-acknowledgments".to_string(),
                },
            },
            postgres: PostgresConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "plasterbot".to_string(),
                username: "postgres".to_string(),
                password: "password".to_string(),
                max_connections: 10,
            },
            cache: CacheConfig {
                obstacle_ttl_seconds: 300,
            },
            planner: PlannerConfig {
                expansion_budget: 1_000_000,
            },
            dispatch: DispatchConfig {
                batch_size: 1,
                max_publish_attempts: 5,
                retry_base_delay_ms: 100,
                retry_max_delay_ms: 5_000,
            },
            tracker: TrackerConfig {
                execution_timeout_seconds: 120,
                sweep_interval_seconds: 10,
                dedup_window_seconds: 600,
            },
        }
    }
}
