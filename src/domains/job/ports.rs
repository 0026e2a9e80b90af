use async_trait::async_trait;

use super::messages::InstructionMessage;

/// Port for the outbound instruction queue. Implementations (adapters)
/// provide Kafka or in-memory transports.
#[async_trait]
pub trait InstructionQueue: Send + Sync {
    /// Publish one instruction and return only once the broker has
    /// durably accepted it (publisher-confirm semantics).
    async fn publish(&self, message: &InstructionMessage) -> Result<(), String>;
}
