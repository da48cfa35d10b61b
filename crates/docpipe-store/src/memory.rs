use async_trait::async_trait;
use bytes::Bytes;
use docpipe_domain::{
    DeliveryQueue, DomainError, DomainResult, EventKind, GetObjectInput, ObjectCreatedEvent,
    ObjectStore, PutObjectInput, StoredObject,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct VersionedObject {
    version_id: String,
    body: Bytes,
    created_at: chrono::DateTime<chrono::Utc>,
}

struct ContainerState {
    versioned: bool,
    /// Version history per key, oldest first. Unversioned containers keep
    /// only the current version.
    objects: HashMap<String, Vec<VersionedObject>>,
}

/// In-memory versioned object store with object-created notifications.
///
/// Containers are created up front; each may carry any number of queue
/// subscriptions. A committed write enqueues exactly one notification per
/// subscription. The enqueue is best-effort: a failure after the commit
/// loses that notification and is only logged, never surfaced to the
/// writer, so downstream consumers must tolerate both gaps and duplicates.
pub struct MemoryObjectStore {
    containers: Mutex<HashMap<String, ContainerState>>,
    subscriptions: Mutex<HashMap<String, Vec<Arc<dyn DeliveryQueue>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a container if it does not already exist.
    pub async fn ensure_container(&self, name: &str, versioned: bool) {
        let mut containers = self.containers.lock().await;
        if containers.contains_key(name) {
            debug!(container = %name, "Container already exists");
            return;
        }
        containers.insert(
            name.to_string(),
            ContainerState {
                versioned,
                objects: HashMap::new(),
            },
        );
        info!(container = %name, versioned, "Created container");
    }

    /// Subscribe a queue to object-created events from a container.
    pub async fn subscribe_object_created(
        &self,
        container: &str,
        queue: Arc<dyn DeliveryQueue>,
    ) -> DomainResult<()> {
        if !self.containers.lock().await.contains_key(container) {
            return Err(DomainError::ContainerNotFound(container.to_string()));
        }
        self.subscriptions
            .lock()
            .await
            .entry(container.to_string())
            .or_default()
            .push(queue);
        info!(container = %container, "Subscribed queue to object-created events");
        Ok(())
    }

    /// Number of distinct keys currently stored in a container.
    pub async fn key_count(&self, container: &str) -> DomainResult<usize> {
        let containers = self.containers.lock().await;
        let state = containers
            .get(container)
            .ok_or_else(|| DomainError::ContainerNotFound(container.to_string()))?;
        Ok(state.objects.len())
    }

    /// Number of stored versions for one key.
    pub async fn version_count(&self, container: &str, key: &str) -> DomainResult<usize> {
        let containers = self.containers.lock().await;
        let state = containers
            .get(container)
            .ok_or_else(|| DomainError::ContainerNotFound(container.to_string()))?;
        Ok(state.objects.get(key).map_or(0, |versions| versions.len()))
    }

    async fn notify_object_created(&self, stored: &StoredObject) {
        let subscriptions = self.subscriptions.lock().await;
        let Some(queues) = subscriptions.get(&stored.container) else {
            return;
        };

        let event = ObjectCreatedEvent {
            event: EventKind::ObjectCreated,
            container: stored.container.clone(),
            key: stored.key.clone(),
            version_id: stored.version_id.clone(),
            occurred_at: stored.created_at,
        };
        let body = match event.encode() {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    error = %e,
                    container = %stored.container,
                    key = %stored.key,
                    "Failed to encode object-created notification"
                );
                return;
            }
        };

        for queue in queues {
            // Fire-and-forget boundary: the write has already committed, a
            // lost notification stays lost.
            if let Err(e) = queue.send_message(body.clone()).await {
                warn!(
                    error = %e,
                    container = %stored.container,
                    key = %stored.key,
                    "Failed to enqueue object-created notification"
                );
            } else {
                debug!(
                    container = %stored.container,
                    key = %stored.key,
                    version_id = %stored.version_id,
                    "Enqueued object-created notification"
                );
            }
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, input: PutObjectInput) -> DomainResult<StoredObject> {
        let stored = {
            let mut containers = self.containers.lock().await;
            let state = containers
                .get_mut(&input.container)
                .ok_or_else(|| DomainError::ContainerNotFound(input.container.clone()))?;

            let version = VersionedObject {
                version_id: Uuid::new_v4().to_string(),
                body: input.body,
                created_at: chrono::Utc::now(),
            };
            let stored = StoredObject {
                container: input.container.clone(),
                key: input.key.clone(),
                version_id: version.version_id.clone(),
                body: version.body.clone(),
                created_at: version.created_at,
            };

            let versions = state.objects.entry(input.key).or_default();
            if !state.versioned {
                versions.clear();
            }
            versions.push(version);
            stored
        };

        debug!(
            container = %stored.container,
            key = %stored.key,
            version_id = %stored.version_id,
            size = stored.body.len(),
            "Committed object version"
        );

        self.notify_object_created(&stored).await;
        Ok(stored)
    }

    async fn get_object(&self, input: GetObjectInput) -> DomainResult<Option<StoredObject>> {
        let containers = self.containers.lock().await;
        let state = containers
            .get(&input.container)
            .ok_or_else(|| DomainError::ContainerNotFound(input.container.clone()))?;

        let current = state.objects.get(&input.key).and_then(|versions| {
            versions.last().map(|version| StoredObject {
                container: input.container.clone(),
                key: input.key.clone(),
                version_id: version.version_id.clone(),
                body: version.body.clone(),
                created_at: version.created_at,
            })
        });
        Ok(current)
    }
}
