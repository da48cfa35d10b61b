use docpipe_domain::{
    DomainError, DomainResult, GetObjectInput, ObjectCreatedEvent, ObjectStore, PutObjectInput,
    StoredObject,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Domain service that copies a newly created document into the cached
/// container.
///
/// Flow:
/// 1. Read the current version of the object named by the event
/// 2. Skip the write when the destination already holds the same bytes
/// 3. Otherwise commit the payload under the same key in the destination
///
/// The service is idempotent under at-least-once, possibly concurrent
/// delivery: re-processing an event leaves the destination's current object
/// unchanged. It never retries internally — a failed transfer is reported
/// and the queue's redelivery does the rest.
pub struct DocumentTransferService {
    store: Arc<dyn ObjectStore>,
    destination_container: String,
}

impl DocumentTransferService {
    pub fn new(store: Arc<dyn ObjectStore>, destination_container: impl Into<String>) -> Self {
        Self {
            store,
            destination_container: destination_container.into(),
        }
    }

    /// Transfer the object named by one object-created event.
    pub async fn transfer(&self, event: &ObjectCreatedEvent) -> DomainResult<StoredObject> {
        debug!(
            container = %event.container,
            key = %event.key,
            version_id = %event.version_id,
            "Transferring document"
        );

        let source = self
            .store
            .get_object(GetObjectInput {
                container: event.container.clone(),
                key: event.key.clone(),
            })
            .await?
            .ok_or_else(|| DomainError::ObjectNotFound {
                container: event.container.clone(),
                key: event.key.clone(),
            })?;

        let cached = self
            .store
            .get_object(GetObjectInput {
                container: self.destination_container.clone(),
                key: event.key.clone(),
            })
            .await?;
        if let Some(cached) = cached {
            if cached.body == source.body {
                debug!(
                    container = %self.destination_container,
                    key = %event.key,
                    "Document already cached, skipping write"
                );
                return Ok(cached);
            }
        }

        let stored = self
            .store
            .put_object(PutObjectInput {
                container: self.destination_container.clone(),
                key: event.key.clone(),
                body: source.body,
            })
            .await?;

        info!(
            source_container = %event.container,
            destination_container = %stored.container,
            key = %stored.key,
            version_id = %stored.version_id,
            "Transferred document"
        );

        Ok(stored)
    }
}
