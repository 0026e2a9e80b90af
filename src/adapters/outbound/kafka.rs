use crate::config::KafkaConfig;
use crate::domains::job::{AckMessage, InstructionMessage, InstructionQueue};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use std::time::Duration;
use tokio::sync::mpsc;

/// Kafka-backed instruction queue. `publish` awaits the broker's
/// confirmation, giving the dispatcher its publisher-confirm semantics.
pub struct KafkaInstructionQueue {
    producer: FutureProducer,
    topic: String,
}

impl KafkaInstructionQueue {
    pub fn new(config: &KafkaConfig) -> Result<Self, String> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| format!("Failed to create Kafka producer: {}", e))?;

        Ok(Self {
            producer,
            topic: config.topics.robot_instructions.clone(),
        })
    }
}

#[async_trait]
impl InstructionQueue for KafkaInstructionQueue {
    async fn publish(&self, message: &InstructionMessage) -> Result<(), String> {
        let payload = serde_json::to_string(message)
            .map_err(|e| format!("Failed to serialize instruction: {}", e))?;
        // Keyed by job id so one job's instructions stay on one partition,
        // preserving order for the robot.
        let record = FutureRecord::to(&self.topic)
            .key(&message.job_id)
            .payload(&payload);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| format!("Failed to send instruction to Kafka: {}", e))?;
        Ok(())
    }
}

/// Subscribe to the acknowledgment topic and forward decoded messages into
/// the execution tracker's channel. The task ends when the channel closes.
pub fn spawn_ack_consumer(
    config: &KafkaConfig,
    sender: mpsc::Sender<AckMessage>,
) -> Result<tokio::task::JoinHandle<()>, String> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", config.brokers.join(","))
        .set("group.id", &config.group_id)
        .set("client.id", &config.client_id)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000")
        .set("enable.auto.commit", "true")
        .create()
        .map_err(|e| format!("Failed to create Kafka consumer: {}", e))?;

    consumer
        .subscribe(&[&config.topics.robot_acknowledgments])
        .map_err(|e| format!("Failed to subscribe to acknowledgment topic: {}", e))?;

    Ok(tokio::spawn(async move {
        loop {
            match consumer.recv().await {
                Ok(message) => {
                    let Some(payload) = message.payload() else {
                        continue;
                    };
                    match serde_json::from_slice::<AckMessage>(payload) {
                        Ok(ack) => {
                            if sender.send(ack).await.is_err() {
                                tracing::info!("ack channel closed, consumer stopping");
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!("dropping undecodable acknowledgment: {}", err);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("Kafka acknowledgment receive error: {}", err);
                }
            }
        }
    }))
}
