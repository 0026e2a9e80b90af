pub mod kafka;
pub mod postgres;

pub use kafka::{spawn_ack_consumer, KafkaInstructionQueue};
pub use postgres::PostgresStateStore;
