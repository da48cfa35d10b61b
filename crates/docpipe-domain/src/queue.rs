use crate::error::DomainResult;
use crate::message::DeliveryRecord;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Durable, at-least-once message buffer between the object store and the
/// batch consumer.
///
/// The queue exclusively owns message lifecycle state: visibility deadlines,
/// receive counts and deletion. Consumers only report outcomes back through
/// these operations. Visibility is a lease, not a lock — it can expire while
/// a batch is still in flight, so downstream processing must be idempotent.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Enqueue one message. Returns the assigned message id.
    async fn send_message(&self, body: Bytes) -> DomainResult<String>;

    /// Return up to `max_messages` currently visible messages, waiting at
    /// most `max_wait` for the first one. Each returned message becomes
    /// invisible for the queue's visibility timeout, has its receive count
    /// incremented, and carries a fresh receipt handle.
    async fn receive(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> DomainResult<Vec<DeliveryRecord>>;

    /// Permanently remove a message. Errors with `StaleReceiptHandle` when
    /// the handle no longer identifies an in-flight delivery.
    async fn delete_message(&self, receipt_handle: &str) -> DomainResult<()>;

    /// Replace the remaining visibility lease of an in-flight delivery.
    /// A zero timeout makes the message immediately redeliverable.
    async fn change_visibility(&self, receipt_handle: &str, timeout: Duration) -> DomainResult<()>;
}
