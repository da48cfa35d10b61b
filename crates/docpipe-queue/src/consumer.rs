use anyhow::{Context, Result};
use docpipe_domain::{Batch, BatchResponse, DeliveryQueue, DeliveryRecord};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Type alias for the batch processor function.
///
/// Takes one delivered batch and returns a partial-failure report. The
/// processor is responsible for deserializing message bodies and running the
/// business logic; it never touches queue state itself.
pub type BatchProcessor =
    Box<dyn Fn(Batch) -> BoxFuture<'static, Result<BatchResponse>> + Send + Sync>;

/// Configuration for a [`QueueConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum number of messages per handler invocation.
    pub batch_size: usize,
    /// How long one receive call waits for the first message.
    pub max_batching_window: Duration,
    /// When enabled, a returned report settles each record individually.
    /// When disabled, only the Ok/Err outcome of the invocation counts and
    /// any reported item failures are ignored.
    pub report_item_failures: bool,
}

/// Generic batched queue consumer.
///
/// Pulls batches from a delivery queue, invokes the processor, and settles
/// the batch according to the partial-failure contract:
///
/// - a record not named in the report is deleted;
/// - a named record has its visibility cut to zero so it is redelivered
///   promptly, receive count incremented;
/// - a processor that fails the whole invocation settles nothing — every
///   record in the batch comes back after its visibility deadline.
///
/// One item failing and the invocation failing are different outcomes; the
/// consumer never conflates them.
pub struct QueueConsumer {
    queue: Arc<dyn DeliveryQueue>,
    config: ConsumerConfig,
    processor: BatchProcessor,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn DeliveryQueue>, config: ConsumerConfig, processor: BatchProcessor) -> Self {
        Self {
            queue,
            config,
            processor,
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error processing batch");
                        // Keep consuming despite errors
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    /// Fetch one batch, invoke the processor and settle the outcome.
    pub async fn poll_once(&self) -> Result<()> {
        let records = self
            .queue
            .receive(self.config.batch_size, self.config.max_batching_window)
            .await
            .context("Failed to receive messages")?;

        if records.is_empty() {
            debug!("No messages in batch");
            return Ok(());
        }

        debug!(message_count = records.len(), "Received message batch");

        let batch = Batch::new(records.clone());
        match (self.processor)(batch).await {
            Ok(response) => self.settle(&records, response).await,
            Err(e) => {
                // Fatal invocation failure: settle nothing, the whole batch
                // becomes visible again after its deadline.
                error!(
                    error = %e,
                    message_count = records.len(),
                    "Processor failed the invocation, leaving batch for redelivery"
                );
                Ok(())
            }
        }
    }

    async fn settle(&self, records: &[DeliveryRecord], response: BatchResponse) -> Result<()> {
        let failed: HashSet<&str> = if self.config.report_item_failures {
            response
                .batch_item_failures
                .iter()
                .map(|f| f.item_identifier.as_str())
                .collect()
        } else {
            if !response.is_clean() {
                warn!(
                    reported = response.batch_item_failures.len(),
                    "Item failure reporting is disabled, ignoring reported failures"
                );
            }
            HashSet::new()
        };

        let known: HashSet<&str> = records.iter().map(|r| r.message_id.as_str()).collect();
        for failure in &failed {
            if !known.contains(failure) {
                warn!(
                    item_identifier = %failure,
                    batch_size = records.len(),
                    "Reported item failure does not match any message in the batch"
                );
            }
        }

        let mut deleted = 0usize;
        let mut returned = 0usize;
        for record in records {
            if failed.contains(record.message_id.as_str()) {
                // Cut the lease so the failed record is redelivered promptly
                // rather than after the full visibility timeout.
                if let Err(e) = self
                    .queue
                    .change_visibility(&record.receipt_handle, Duration::ZERO)
                    .await
                {
                    warn!(
                        error = %e,
                        message_id = %record.message_id,
                        "Failed to return message for redelivery"
                    );
                } else {
                    returned += 1;
                }
            } else if let Err(e) = self.queue.delete_message(&record.receipt_handle).await {
                error!(
                    error = %e,
                    message_id = %record.message_id,
                    "Failed to delete processed message"
                );
            } else {
                deleted += 1;
            }
        }

        debug!(deleted, returned, "Settled message batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDeliveryQueue, MemoryQueueConfig};
    use bytes::Bytes;
    use docpipe_domain::BatchItemFailure;
    use std::sync::Mutex;

    fn test_queue(visibility: Duration) -> Arc<MemoryDeliveryQueue> {
        let mut config = MemoryQueueConfig::new("consumer-test");
        config.visibility_timeout = visibility;
        Arc::new(MemoryDeliveryQueue::new(config))
    }

    fn consumer_config() -> ConsumerConfig {
        ConsumerConfig {
            batch_size: 10,
            max_batching_window: Duration::ZERO,
            report_item_failures: true,
        }
    }

    /// Processor that records every batch it sees and replies from a fixed
    /// outcome function.
    fn recording_processor<F>(
        seen: Arc<Mutex<Vec<Batch>>>,
        outcome: F,
    ) -> BatchProcessor
    where
        F: Fn(&Batch) -> Result<BatchResponse> + Send + Sync + 'static,
    {
        Box::new(move |batch: Batch| {
            let seen = Arc::clone(&seen);
            let result = outcome(&batch);
            Box::pin(async move {
                seen.lock().unwrap().push(batch);
                result
            })
        })
    }

    async fn enqueue(queue: &MemoryDeliveryQueue, bodies: &[&str]) -> Vec<String> {
        let mut ids = Vec::new();
        for body in bodies {
            ids.push(
                queue
                    .send_message(Bytes::from(body.as_bytes().to_vec()))
                    .await
                    .unwrap(),
            );
        }
        ids
    }

    #[tokio::test(start_paused = true)]
    async fn empty_report_deletes_every_message() {
        let queue = test_queue(Duration::from_secs(30));
        enqueue(&queue, &["a", "b", "c"]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = recording_processor(Arc::clone(&seen), |_| Ok(BatchResponse::success()));
        let consumer = QueueConsumer::new(queue.clone(), consumer_config(), processor);

        consumer.poll_once().await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(queue.is_empty().await);

        // Nothing left to redeliver, ever.
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(queue.receive(10, Duration::ZERO).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failures_keep_only_the_failed_subset() {
        let queue = test_queue(Duration::from_secs(30));
        let ids = enqueue(&queue, &["a", "b", "c"]).await;
        let failing_id = ids[1].clone();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let fail_target = failing_id.clone();
        let processor = recording_processor(Arc::clone(&seen), move |_| {
            Ok(BatchResponse::with_failures(vec![BatchItemFailure::new(
                fail_target.clone(),
            )]))
        });
        let consumer = QueueConsumer::new(queue.clone(), consumer_config(), processor);

        consumer.poll_once().await.unwrap();

        // A and C are gone, B remains.
        assert_eq!(queue.len().await, 1);

        let redelivered = queue.receive(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].message_id, failing_id);
        assert_eq!(redelivered[0].receive_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_invocation_failure_settles_nothing() {
        let queue = test_queue(Duration::from_secs(30));
        let ids = enqueue(&queue, &["a", "b", "c"]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor =
            recording_processor(Arc::clone(&seen), |_| Err(anyhow::anyhow!("handler blew up")));
        let consumer = QueueConsumer::new(queue.clone(), consumer_config(), processor);

        consumer.poll_once().await.unwrap();

        // Nothing deleted; nothing visible until the deadline passes.
        assert_eq!(queue.len().await, 3);
        assert!(queue.receive(10, Duration::ZERO).await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        let redelivered = queue.receive(10, Duration::ZERO).await.unwrap();
        let mut redelivered_ids: Vec<_> =
            redelivered.iter().map(|r| r.message_id.clone()).collect();
        redelivered_ids.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(redelivered_ids, expected);
        assert!(redelivered.iter().all(|r| r.receive_count == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_item_reappears_after_visibility_deadline() {
        // Scenario from the delivery contract: {A, B, C}, B fails.
        let queue = test_queue(Duration::from_secs(60));
        let ids = enqueue(&queue, &["A", "B", "C"]).await;
        let failing_id = ids[1].clone();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let fail_target = failing_id.clone();
        let processor = recording_processor(Arc::clone(&seen), move |_| {
            Ok(BatchResponse::with_failures(vec![BatchItemFailure::new(
                fail_target.clone(),
            )]))
        });
        let consumer = QueueConsumer::new(queue.clone(), consumer_config(), processor);

        consumer.poll_once().await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let later = queue.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].message_id, failing_id);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_failure_identifiers_are_ignored() {
        let queue = test_queue(Duration::from_secs(30));
        enqueue(&queue, &["a", "b"]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = recording_processor(Arc::clone(&seen), |_| {
            Ok(BatchResponse::with_failures(vec![BatchItemFailure::new(
                "no-such-message",
            )]))
        });
        let consumer = QueueConsumer::new(queue.clone(), consumer_config(), processor);

        consumer.poll_once().await.unwrap();

        // The bogus identifier matches nothing; the real records are deleted.
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn reported_failures_are_ignored_when_reporting_is_disabled() {
        let queue = test_queue(Duration::from_secs(30));
        let ids = enqueue(&queue, &["a", "b"]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let fail_target = ids[0].clone();
        let processor = recording_processor(Arc::clone(&seen), move |_| {
            Ok(BatchResponse::with_failures(vec![BatchItemFailure::new(
                fail_target.clone(),
            )]))
        });
        let mut config = consumer_config();
        config.report_item_failures = false;
        let consumer = QueueConsumer::new(queue.clone(), config, processor);

        consumer.poll_once().await.unwrap();

        // Without item-failure reporting an Ok invocation consumes the batch.
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancellation() {
        let queue = test_queue(Duration::from_secs(30));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = recording_processor(Arc::clone(&seen), |_| Ok(BatchResponse::success()));
        let mut config = consumer_config();
        config.max_batching_window = Duration::from_secs(1);
        let consumer = QueueConsumer::new(queue.clone(), config, processor);

        let ctx = CancellationToken::new();
        let cancel = ctx.clone();
        let run = tokio::spawn(async move { consumer.run(ctx).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        run.await.unwrap().unwrap();
    }
}
