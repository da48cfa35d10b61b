use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, Message};
use async_trait::async_trait;
use bytes::Bytes;
use docpipe_domain::{DeliveryQueue, DeliveryRecord, DomainError, DomainResult, MAX_BATCH_SIZE};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for a JetStream-backed delivery queue.
#[derive(Debug, Clone)]
pub struct JetStreamQueueConfig {
    pub stream: String,
    pub subject: String,
    pub consumer_name: String,
    /// Mapped onto the consumer's `ack_wait`.
    pub visibility_timeout: Duration,
    /// Mapped onto the stream's `max_age`.
    pub retention_period: Duration,
}

/// Connect to a NATS server and return a JetStream context.
pub async fn connect_jetstream(url: &str, timeout: Duration) -> Result<jetstream::Context> {
    info!("Connecting to NATS at {} (timeout={:?})", url, timeout);

    let client = async_nats::ConnectOptions::new()
        .connection_timeout(timeout)
        .connect(url)
        .await
        .context("Failed to connect to NATS")?;

    Ok(jetstream::new(client))
}

struct InflightDelivery {
    message: Message,
    leased_at: Instant,
}

/// Delivery queue backed by a durable JetStream pull consumer.
///
/// The server owns the lease: an unacknowledged message is redelivered once
/// `ack_wait` lapses, with its delivery count incremented. Receipt handles
/// are minted per delivery and resolve to the held server message; a handle
/// whose lease has lapsed is pruned and goes stale, matching the redelivery
/// the server performs on its side.
pub struct JetStreamDeliveryQueue {
    jetstream: jetstream::Context,
    consumer: PullConsumer,
    config: JetStreamQueueConfig,
    inflight: Mutex<HashMap<String, InflightDelivery>>,
}

impl JetStreamDeliveryQueue {
    /// Ensure the stream and durable consumer exist, then wrap them.
    pub async fn connect(
        jetstream: jetstream::Context,
        config: JetStreamQueueConfig,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream,
            consumer = %config.consumer_name,
            subject = %config.subject,
            "Ensuring delivery stream exists"
        );

        match jetstream.get_stream(&config.stream).await {
            Ok(_) => {
                info!(stream = %config.stream, "Stream already exists");
            }
            Err(_) => {
                jetstream
                    .create_stream(jetstream::stream::Config {
                        name: config.stream.clone(),
                        subjects: vec![config.subject.clone()],
                        max_age: config.retention_period,
                        ..Default::default()
                    })
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %config.stream, "Created stream");
            }
        }

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(config.consumer_name.clone()),
                    durable_name: Some(config.consumer_name.clone()),
                    filter_subject: config.subject.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: config.visibility_timeout,
                    ..Default::default()
                },
                config.stream.as_str(),
            )
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = %config.stream,
            consumer = %config.consumer_name,
            "Delivery queue ready"
        );

        Ok(Self {
            jetstream,
            consumer,
            config,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Drop held deliveries whose server lease has already lapsed. The
    /// server redelivers them on its own; keeping the handle alive here
    /// would let a late delete race that redelivery.
    async fn prune_expired_leases(&self) {
        let now = Instant::now();
        let ack_wait = self.config.visibility_timeout;
        let mut inflight = self.inflight.lock().await;
        inflight.retain(|_, delivery| now < delivery.leased_at + ack_wait);
    }

    async fn take_inflight(&self, receipt_handle: &str) -> DomainResult<InflightDelivery> {
        self.inflight
            .lock()
            .await
            .remove(receipt_handle)
            .ok_or_else(|| DomainError::StaleReceiptHandle(receipt_handle.to_string()))
    }
}

#[async_trait]
impl DeliveryQueue for JetStreamDeliveryQueue {
    async fn send_message(&self, body: Bytes) -> DomainResult<String> {
        let ack = self
            .jetstream
            .publish(self.config.subject.clone(), body)
            .await
            .context("Failed to publish message")
            .map_err(DomainError::Backend)?
            .await
            .context("Failed to receive publish acknowledgement")
            .map_err(DomainError::Backend)?;

        let message_id = format!("{}:{}", self.config.stream, ack.sequence);
        debug!(message_id = %message_id, "enqueued message");
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> DomainResult<Vec<DeliveryRecord>> {
        let max_messages = max_messages.min(MAX_BATCH_SIZE);
        self.prune_expired_leases().await;

        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(max_wait)
            .messages()
            .await
            .context("Failed to fetch messages")
            .map_err(DomainError::Backend)?;

        let mut records = Vec::new();
        let mut inflight = self.inflight.lock().await;
        while let Some(result) = messages.next().await {
            match result {
                Ok(message) => {
                    let (message_id, receive_count) = match message.info() {
                        Ok(info) => (
                            format!("{}:{}", self.config.stream, info.stream_sequence),
                            info.delivered.max(1) as u32,
                        ),
                        Err(e) => {
                            warn!(error = %e, "Message missing delivery info, skipping");
                            continue;
                        }
                    };
                    let receipt_handle = Uuid::new_v4().to_string();
                    records.push(DeliveryRecord {
                        message_id,
                        receipt_handle: receipt_handle.clone(),
                        body: message.payload.clone(),
                        receive_count,
                    });
                    inflight.insert(
                        receipt_handle,
                        InflightDelivery {
                            message,
                            leased_at: Instant::now(),
                        },
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Error receiving message from batch");
                }
            }
        }

        if !records.is_empty() {
            debug!(count = records.len(), "delivered message batch");
        }
        Ok(records)
    }

    async fn delete_message(&self, receipt_handle: &str) -> DomainResult<()> {
        let delivery = self.take_inflight(receipt_handle).await?;
        delivery
            .message
            .ack()
            .await
            .map_err(|e| DomainError::Backend(anyhow::anyhow!("Failed to acknowledge message: {e}")))
    }

    async fn change_visibility(&self, receipt_handle: &str, timeout: Duration) -> DomainResult<()> {
        let delivery = self.take_inflight(receipt_handle).await?;
        // Nak with a delay asks the server to redeliver after that long,
        // which replaces whatever remained of the current lease.
        let delay = if timeout.is_zero() { None } else { Some(timeout) };
        delivery
            .message
            .ack_with(jetstream::AckKind::Nak(delay))
            .await
            .map_err(|e| DomainError::Backend(anyhow::anyhow!("Failed to reset message visibility: {e}")))
    }
}
