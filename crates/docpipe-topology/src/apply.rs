use crate::graph::{EventSourceMappingSpec, Topology};
use docpipe_domain::{DomainError, DomainResult};
use docpipe_queue::{MemoryDeliveryQueue, MemoryQueueConfig};
use docpipe_store::MemoryObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Live resources materialized from a [`Topology`].
pub struct Deployment {
    store: Arc<MemoryObjectStore>,
    queues: HashMap<String, Arc<MemoryDeliveryQueue>>,
    mappings: Vec<EventSourceMappingSpec>,
}

impl Deployment {
    pub fn store(&self) -> Arc<MemoryObjectStore> {
        Arc::clone(&self.store)
    }

    pub fn queue(&self, name: &str) -> DomainResult<Arc<MemoryDeliveryQueue>> {
        self.queues
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::QueueNotFound(name.to_string()))
    }

    /// Event-source mappings carried over from the topology, for wiring
    /// consumers onto the materialized queues.
    pub fn mappings(&self) -> &[EventSourceMappingSpec] {
        &self.mappings
    }
}

/// Materialize a validated topology into in-memory backends.
///
/// This is the only place declarations turn into resources: containers and
/// queues are created, then notifications are wired. The topology value
/// itself stays untouched and can be applied again for a fresh deployment.
pub async fn apply(topology: &Topology) -> DomainResult<Deployment> {
    let store = Arc::new(MemoryObjectStore::new());
    for container in &topology.containers {
        store.ensure_container(&container.name, container.versioned).await;
    }

    let mut queues = HashMap::new();
    for spec in &topology.queues {
        let mut config = MemoryQueueConfig::new(spec.name.clone());
        config.visibility_timeout = spec.visibility_timeout;
        config.retention_period = spec.retention_period;
        queues.insert(
            spec.name.clone(),
            Arc::new(MemoryDeliveryQueue::new(config)),
        );
    }

    for notification in &topology.notifications {
        let queue = queues
            .get(&notification.queue)
            .cloned()
            .ok_or_else(|| DomainError::QueueNotFound(notification.queue.clone()))?;
        store
            .subscribe_object_created(&notification.container, queue)
            .await?;
    }

    info!(
        containers = topology.containers.len(),
        queues = topology.queues.len(),
        notifications = topology.notifications.len(),
        mappings = topology.mappings.len(),
        "Applied topology"
    );

    Ok(Deployment {
        store,
        queues,
        mappings: topology.mappings.to_vec(),
    })
}
