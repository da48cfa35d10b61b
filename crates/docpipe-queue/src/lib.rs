mod consumer;
mod jetstream;
mod memory;

pub use consumer::{BatchProcessor, ConsumerConfig, QueueConsumer};
pub use jetstream::{connect_jetstream, JetStreamDeliveryQueue, JetStreamQueueConfig};
pub use memory::{MemoryDeliveryQueue, MemoryQueueConfig};
