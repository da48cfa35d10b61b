use crate::domain::DocumentTransferService;
use docpipe_domain::{Batch, BatchItemFailure, BatchResponse, ObjectCreatedEvent};
use docpipe_queue::BatchProcessor;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Create a batch processor that runs object-created notifications through
/// the transfer service.
///
/// Each record settles on its own: a record whose body does not decode, or
/// whose transfer fails, is reported as an item failure and the rest of the
/// batch is unaffected. The closure itself never errors — a whole-invocation
/// failure would put already-transferred documents back on the queue.
pub fn create_notification_processor(service: Arc<DocumentTransferService>) -> BatchProcessor {
    Box::new(move |batch: Batch| {
        let service = Arc::clone(&service);

        Box::pin(async move {
            let mut item_failures = Vec::new();

            for record in &batch.records {
                let event = match ObjectCreatedEvent::decode(&record.body) {
                    Ok(event) => event,
                    Err(e) => {
                        // Malformed payloads can never succeed; with no
                        // dead-letter policy they loop until retention
                        // drops them.
                        error!(
                            error = %e,
                            message_id = %record.message_id,
                            receive_count = record.receive_count,
                            "failed to decode object-created notification"
                        );
                        item_failures.push(BatchItemFailure::new(record.message_id.clone()));
                        continue;
                    }
                };

                match service.transfer(&event).await {
                    Ok(stored) => {
                        debug!(
                            message_id = %record.message_id,
                            key = %stored.key,
                            "successfully processed notification"
                        );
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            message_id = %record.message_id,
                            key = %event.key,
                            "failed to transfer document"
                        );
                        item_failures.push(BatchItemFailure::new(record.message_id.clone()));
                    }
                }
            }

            Ok(BatchResponse::with_failures(item_failures))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docpipe_domain::{
        DeliveryRecord, EventKind, ObjectStore, PutObjectInput,
    };
    use docpipe_store::MemoryObjectStore;

    async fn seeded_store() -> Arc<MemoryObjectStore> {
        let store = Arc::new(MemoryObjectStore::new());
        store.ensure_container("master-documents", true).await;
        store.ensure_container("cached-documents", true).await;
        store
            .put_object(PutObjectInput {
                container: "master-documents".to_string(),
                key: "a.pdf".to_string(),
                body: Bytes::from_static(b"payload"),
            })
            .await
            .unwrap();
        store
    }

    fn record(message_id: &str, body: Bytes) -> DeliveryRecord {
        DeliveryRecord {
            message_id: message_id.to_string(),
            receipt_handle: format!("rh-{message_id}"),
            body,
            receive_count: 1,
        }
    }

    fn event_body(key: &str) -> Bytes {
        ObjectCreatedEvent {
            event: EventKind::ObjectCreated,
            container: "master-documents".to_string(),
            key: key.to_string(),
            version_id: "v-1".to_string(),
            occurred_at: chrono::Utc::now(),
        }
        .encode()
        .unwrap()
    }

    #[tokio::test]
    async fn clean_batch_reports_no_failures() {
        let store = seeded_store().await;
        let service = Arc::new(DocumentTransferService::new(
            store.clone(),
            "cached-documents",
        ));
        let processor = create_notification_processor(service);

        let batch = Batch::new(vec![record("m-1", event_body("a.pdf"))]);
        let response = processor(batch).await.unwrap();
        assert!(response.is_clean());

        let cached = store
            .get_object(docpipe_domain::GetObjectInput {
                container: "cached-documents".to_string(),
                key: "a.pdf".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.body, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn only_the_failing_records_are_reported() {
        let store = seeded_store().await;
        let service = Arc::new(DocumentTransferService::new(
            store.clone(),
            "cached-documents",
        ));
        let processor = create_notification_processor(service);

        let batch = Batch::new(vec![
            record("m-good", event_body("a.pdf")),
            record("m-garbage", Bytes::from_static(b"not json")),
            record("m-missing", event_body("never-uploaded.pdf")),
        ]);
        let response = processor(batch).await.unwrap();

        let mut failed: Vec<_> = response
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect();
        failed.sort();
        assert_eq!(failed, vec!["m-garbage", "m-missing"]);
    }

    #[tokio::test]
    async fn reprocessing_a_record_is_idempotent() {
        let store = seeded_store().await;
        let service = Arc::new(DocumentTransferService::new(
            store.clone(),
            "cached-documents",
        ));
        let processor = create_notification_processor(service);

        let first = Batch::new(vec![record("m-1", event_body("a.pdf"))]);
        processor(first).await.unwrap();

        // Redelivery of the same notification.
        let mut redelivered = record("m-1", event_body("a.pdf"));
        redelivered.receive_count = 2;
        let response = processor(Batch::new(vec![redelivered])).await.unwrap();
        assert!(response.is_clean());

        // The duplicate write was skipped: one cached version, same bytes.
        assert_eq!(
            store
                .version_count("cached-documents", "a.pdf")
                .await
                .unwrap(),
            1
        );
    }
}
