use async_trait::async_trait;
use bytes::Bytes;
use docpipe_domain::{DeliveryQueue, DeliveryRecord, DomainError, DomainResult, MAX_BATCH_SIZE};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// How often a waiting receive call re-checks for visible messages.
const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for an in-memory delivery queue.
#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    pub name: String,
    /// Lease duration during which a delivered-but-undeleted message is
    /// hidden from other consumers.
    pub visibility_timeout: Duration,
    /// Maximum age of an unconsumed message before it is dropped for good.
    pub retention_period: Duration,
}

impl MemoryQueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility_timeout: Duration::from_secs(60),
            retention_period: Duration::from_secs(3 * 24 * 60 * 60),
        }
    }
}

struct QueuedMessage {
    id: String,
    body: Bytes,
    enqueued_at: Instant,
    visible_at: Instant,
    receive_count: u32,
    receipt_handle: Option<String>,
}

/// In-memory delivery queue with visibility leases, receive counts and a
/// retention window.
///
/// Messages live until explicitly deleted or until the retention period
/// elapses. An undeleted delivery becomes visible again once its lease
/// expires and is handed out with an incremented receive count and a fresh
/// receipt handle; the previous handle goes stale at that point.
pub struct MemoryDeliveryQueue {
    config: MemoryQueueConfig,
    messages: Mutex<VecDeque<QueuedMessage>>,
}

impl MemoryDeliveryQueue {
    pub fn new(config: MemoryQueueConfig) -> Self {
        Self {
            config,
            messages: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Approximate queue depth, in-flight deliveries included.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    async fn take_visible(&self, max_messages: usize) -> Vec<DeliveryRecord> {
        let now = Instant::now();
        let mut messages = self.messages.lock().await;

        let queue_name = self.config.name.clone();
        let retention = self.config.retention_period;
        messages.retain(|message| {
            let expired = now >= message.enqueued_at + retention;
            if expired {
                debug!(
                    queue = %queue_name,
                    message_id = %message.id,
                    "dropping message past retention"
                );
            }
            !expired
        });

        let mut records = Vec::new();
        for message in messages.iter_mut() {
            if records.len() == max_messages {
                break;
            }
            if now < message.visible_at {
                continue;
            }
            message.receive_count += 1;
            message.visible_at = now + self.config.visibility_timeout;
            let receipt_handle = Uuid::new_v4().to_string();
            message.receipt_handle = Some(receipt_handle.clone());
            records.push(DeliveryRecord {
                message_id: message.id.clone(),
                receipt_handle,
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
        }
        records
    }
}

#[async_trait]
impl DeliveryQueue for MemoryDeliveryQueue {
    async fn send_message(&self, body: Bytes) -> DomainResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut messages = self.messages.lock().await;
        messages.push_back(QueuedMessage {
            id: id.clone(),
            body,
            enqueued_at: now,
            visible_at: now,
            receive_count: 0,
            receipt_handle: None,
        });
        debug!(queue = %self.config.name, message_id = %id, "enqueued message");
        Ok(id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> DomainResult<Vec<DeliveryRecord>> {
        let max_messages = max_messages.min(MAX_BATCH_SIZE);
        let deadline = Instant::now() + max_wait;
        loop {
            let records = self.take_visible(max_messages).await;
            if !records.is_empty() {
                debug!(
                    queue = %self.config.name,
                    count = records.len(),
                    "delivered message batch"
                );
                return Ok(records);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(RECEIVE_POLL_INTERVAL).await;
        }
    }

    async fn delete_message(&self, receipt_handle: &str) -> DomainResult<()> {
        let mut messages = self.messages.lock().await;
        let position = messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle));
        match position {
            Some(index) => {
                let message = messages.remove(index).expect("index is in bounds");
                debug!(
                    queue = %self.config.name,
                    message_id = %message.id,
                    "deleted message"
                );
                Ok(())
            }
            None => Err(DomainError::StaleReceiptHandle(receipt_handle.to_string())),
        }
    }

    async fn change_visibility(&self, receipt_handle: &str, timeout: Duration) -> DomainResult<()> {
        let now = Instant::now();
        let mut messages = self.messages.lock().await;
        let message = messages
            .iter_mut()
            .find(|m| m.receipt_handle.as_deref() == Some(receipt_handle));
        match message {
            Some(message) => {
                message.visible_at = now + timeout;
                debug!(
                    queue = %self.config.name,
                    message_id = %message.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "changed message visibility"
                );
                Ok(())
            }
            None => Err(DomainError::StaleReceiptHandle(receipt_handle.to_string())),
        }
    }
}
