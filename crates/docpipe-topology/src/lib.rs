mod apply;
mod graph;

pub use apply::{apply, Deployment};
pub use graph::{
    ContainerSpec, EventSourceMappingSpec, NotificationSpec, QueueSpec, Topology, TopologyBuilder,
};
