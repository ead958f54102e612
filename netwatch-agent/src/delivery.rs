//! Report and notice delivery
//!
//! Delivery is at-most-once: each recipient gets one attempt, failures are
//! logged and counted, nothing is retried.
//! - `MqttDelivery`: one JSON message per recipient on `<topic>/<recipient>`;
//!   a full request queue (broker unreachable) fails the recipient at once
//! - `LogDelivery`: writes deliveries to the log when no broker is configured

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Artifact { path: PathBuf, caption: String },
    Message(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver_to(&self, recipient: &str, delivery: &Delivery) -> Result<()>;

    /// One attempt per recipient; failures are logged and do not stop the rest
    async fn deliver(&self, recipients: &[String], delivery: &Delivery) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for recipient in recipients {
            match self.deliver_to(recipient, delivery).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Delivery to {} failed: {:#}", recipient, e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

pub struct LogDelivery;

#[async_trait]
impl DeliveryChannel for LogDelivery {
    async fn deliver_to(&self, recipient: &str, delivery: &Delivery) -> Result<()> {
        match delivery {
            Delivery::Artifact { path, caption } => {
                info!("[{}] {} -> {}", recipient, caption, path.display())
            }
            Delivery::Message(text) => info!("[{}] {}", recipient, text),
        }
        Ok(())
    }
}

/// Wire payload published per recipient
#[derive(Debug, Serialize)]
struct DeliveryMessage<'a> {
    recipient: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<String>,
    timestamp: DateTime<Utc>,
}

pub struct MqttDelivery {
    client: AsyncClient,
    topic: String,
}

impl MqttDelivery {
    /// Connect to the broker and drive its event loop in the background
    pub fn connect(config: &MqttConfig) -> Self {
        let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        mqtt_options.set_clean_session(true);
        // Report artifacts can exceed the default 10 KiB packet limit
        mqtt_options.set_max_packet_size(4 * 1024 * 1024, 4 * 1024 * 1024);

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => debug!("MQTT delivery channel connected"),
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        info!("MQTT delivery to {}:{} on topic {}", config.host, config.port, config.topic);
        Self {
            client,
            topic: config.topic.clone(),
        }
    }

    fn encode(recipient: &str, delivery: &Delivery, artifact: Option<String>) -> Result<String> {
        let message = match delivery {
            Delivery::Artifact { path, caption } => DeliveryMessage {
                recipient,
                kind: "artifact",
                caption: Some(caption),
                text: None,
                artifact_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
                artifact,
                timestamp: Utc::now(),
            },
            Delivery::Message(text) => DeliveryMessage {
                recipient,
                kind: "message",
                caption: None,
                text: Some(text),
                artifact_name: None,
                artifact: None,
                timestamp: Utc::now(),
            },
        };
        serde_json::to_string(&message).context("Failed to serialize delivery message")
    }
}

#[async_trait]
impl DeliveryChannel for MqttDelivery {
    async fn deliver_to(&self, recipient: &str, delivery: &Delivery) -> Result<()> {
        let artifact = match delivery {
            Delivery::Artifact { path, .. } => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read artifact {}", path.display()))?,
            ),
            Delivery::Message(_) => None,
        };
        let payload = Self::encode(recipient, delivery, artifact)?;

        self.client
            .try_publish(format!("{}/{}", self.topic, recipient), QoS::AtLeastOnce, false, payload)
            .context("Failed to queue delivery")?;

        debug!("Delivery queued for {}", recipient);
        Ok(())
    }
}
