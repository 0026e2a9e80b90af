//! Simulated wall-finishing robot: consumes instruction messages from the
//! outbound queue, "executes" each waypoint batch, and reports
//! acknowledgments on the reply topic. Redelivered instructions are
//! recognized by their idempotency token and acknowledged again without
//! being re-applied.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;

use plasterbot::domains::job::{AckMessage, InstructionMessage};
use plasterbot::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file("config.toml")
        .await
        .unwrap_or_else(|_| Config::default());

    println!("🤖 Robot simulator starting up");
    println!("   Instructions: {}", config.kafka.topics.robot_instructions);
    println!("   Acknowledgments: {}", config.kafka.topics.robot_acknowledgments);

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", config.kafka.brokers.join(","))
        .set("group.id", "robot-sim")
        .set("client.id", "robot-sim")
        .set("enable.partition.eof", "false")
        .set("enable.auto.commit", "true")
        .create()?;
    consumer.subscribe(&[config.kafka.topics.robot_instructions.as_str()])?;

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", config.kafka.brokers.join(","))
        .set("client.id", "robot-sim")
        .set("message.timeout.ms", "5000")
        .create()?;

    let mut applied: HashSet<String> = HashSet::new();

    println!("👂 Waiting for instructions...");
    loop {
        let message = match consumer.recv().await {
            Ok(message) => message,
            Err(err) => {
                eprintln!("⚠️ receive error: {}", err);
                continue;
            }
        };
        let Some(payload) = message.payload() else {
            continue;
        };
        let instruction: InstructionMessage = match serde_json::from_slice(payload) {
            Ok(instruction) => instruction,
            Err(err) => {
                eprintln!("⚠️ dropping undecodable instruction: {}", err);
                continue;
            }
        };

        if applied.contains(&instruction.idempotency_token) {
            println!(
                "🔁 Redelivery of {} ignored, re-acknowledging",
                instruction.idempotency_token
            );
        } else {
            for waypoint in &instruction.waypoints {
                println!(
                    "🛠️ Job {} step {}: finishing cell {} heading {:?}",
                    instruction.job_id, instruction.sequence, waypoint.cell, waypoint.heading
                );
                sleep(Duration::from_millis(50)).await;
            }
            applied.insert(instruction.idempotency_token.clone());
        }

        send_ack(
            &producer,
            &config.kafka.topics.robot_acknowledgments,
            AckMessage::ack(&instruction.job_id, instruction.sequence),
        )
        .await;

        if instruction.is_final {
            println!("🎉 Job {} finished, reporting completion", instruction.job_id);
            send_ack(
                &producer,
                &config.kafka.topics.robot_acknowledgments,
                AckMessage::complete(&instruction.job_id, instruction.sequence),
            )
            .await;
        }
    }
}

async fn send_ack(producer: &FutureProducer, topic: &str, ack: AckMessage) {
    let payload = match serde_json::to_string(&ack) {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("⚠️ failed to serialize acknowledgment: {}", err);
            return;
        }
    };
    let record = FutureRecord::to(topic).key(&ack.job_id).payload(&payload);
    if let Err((err, _)) = producer.send(record, Duration::from_secs(5)).await {
        eprintln!("⚠️ failed to send acknowledgment: {}", err);
    }
}
