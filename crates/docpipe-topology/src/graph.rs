use docpipe_domain::{DomainError, DomainResult, MAX_BATCH_SIZE};
use std::collections::HashSet;
use std::time::Duration;

/// Desired state of one object container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub versioned: bool,
}

/// Desired state of one delivery queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub visibility_timeout: Duration,
    pub retention_period: Duration,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility_timeout: Duration::from_secs(60),
            retention_period: Duration::from_secs(3 * 24 * 60 * 60),
        }
    }

    pub fn visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn retention_period(mut self, period: Duration) -> Self {
        self.retention_period = period;
        self
    }
}

/// Object-created events from a container flow into a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSpec {
    pub container: String,
    pub queue: String,
}

/// A queue drives a named batch processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSourceMappingSpec {
    pub queue: String,
    pub function_name: String,
    pub batch_size: usize,
    pub max_batching_window: Duration,
    pub report_item_failures: bool,
}

impl EventSourceMappingSpec {
    pub fn new(queue: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            function_name: function_name.into(),
            batch_size: MAX_BATCH_SIZE,
            max_batching_window: Duration::from_secs(60),
            report_item_failures: true,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_batching_window(mut self, window: Duration) -> Self {
        self.max_batching_window = window;
        self
    }

    pub fn report_item_failures(mut self, enabled: bool) -> Self {
        self.report_item_failures = enabled;
        self
    }
}

/// A validated, purely descriptive resource graph.
///
/// Building a topology has no side effects; materialization is a separate
/// step (see [`crate::apply`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub containers: Vec<ContainerSpec>,
    pub queues: Vec<QueueSpec>,
    pub notifications: Vec<NotificationSpec>,
    pub mappings: Vec<EventSourceMappingSpec>,
}

/// Collects resource declarations and validates them into a [`Topology`].
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    containers: Vec<ContainerSpec>,
    queues: Vec<QueueSpec>,
    notifications: Vec<NotificationSpec>,
    mappings: Vec<EventSourceMappingSpec>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(mut self, name: impl Into<String>, versioned: bool) -> Self {
        self.containers.push(ContainerSpec {
            name: name.into(),
            versioned,
        });
        self
    }

    pub fn queue(mut self, spec: QueueSpec) -> Self {
        self.queues.push(spec);
        self
    }

    pub fn notification(mut self, container: impl Into<String>, queue: impl Into<String>) -> Self {
        self.notifications.push(NotificationSpec {
            container: container.into(),
            queue: queue.into(),
        });
        self
    }

    pub fn event_source_mapping(mut self, spec: EventSourceMappingSpec) -> Self {
        self.mappings.push(spec);
        self
    }

    /// Validate the declarations and produce the topology.
    ///
    /// Rejects duplicate resource names, references to undeclared resources
    /// and out-of-range batch sizes.
    pub fn build(self) -> DomainResult<Topology> {
        let mut container_names = HashSet::new();
        for container in &self.containers {
            if !container_names.insert(container.name.as_str()) {
                return Err(DomainError::InvalidTopology(format!(
                    "duplicate container name: {}",
                    container.name
                )));
            }
        }

        let mut queue_names = HashSet::new();
        for queue in &self.queues {
            if !queue_names.insert(queue.name.as_str()) {
                return Err(DomainError::InvalidTopology(format!(
                    "duplicate queue name: {}",
                    queue.name
                )));
            }
        }

        for notification in &self.notifications {
            if !container_names.contains(notification.container.as_str()) {
                return Err(DomainError::InvalidTopology(format!(
                    "notification references undeclared container: {}",
                    notification.container
                )));
            }
            if !queue_names.contains(notification.queue.as_str()) {
                return Err(DomainError::InvalidTopology(format!(
                    "notification references undeclared queue: {}",
                    notification.queue
                )));
            }
        }

        for mapping in &self.mappings {
            if !queue_names.contains(mapping.queue.as_str()) {
                return Err(DomainError::InvalidTopology(format!(
                    "event source mapping references undeclared queue: {}",
                    mapping.queue
                )));
            }
            if mapping.batch_size == 0 || mapping.batch_size > MAX_BATCH_SIZE {
                return Err(DomainError::InvalidTopology(format!(
                    "batch size {} for function {} is outside 1..={}",
                    mapping.batch_size, mapping.function_name, MAX_BATCH_SIZE
                )));
            }
        }

        Ok(Topology {
            containers: self.containers,
            queues: self.queues,
            notifications: self.notifications,
            mappings: self.mappings,
        })
    }
}
