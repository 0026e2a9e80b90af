use crate::domains::job::{InstructionMessage, InstructionQueue};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// In-memory instruction queue for testing and development: publishing
/// appends to an unbounded channel, and the send itself is the durable-
/// acceptance confirmation.
pub struct InMemoryInstructionQueue {
    sender: mpsc::UnboundedSender<InstructionMessage>,
    receiver: Mutex<mpsc::UnboundedReceiver<InstructionMessage>>,
}

impl InMemoryInstructionQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Drain every message published so far.
    pub async fn drain(&self) -> Vec<InstructionMessage> {
        let mut receiver = self.receiver.lock().await;
        let mut out = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            out.push(message);
        }
        out
    }
}

impl Default for InMemoryInstructionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstructionQueue for InMemoryInstructionQueue {
    async fn publish(&self, message: &InstructionMessage) -> Result<(), String> {
        self.sender
            .send(message.clone())
            .map_err(|e| format!("Failed to enqueue instruction: {}", e))
    }
}
