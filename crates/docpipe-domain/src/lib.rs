pub mod error;
pub mod message;
pub mod notification;
pub mod queue;
pub mod store;

pub use error::{DomainError, DomainResult};
pub use message::{Batch, BatchItemFailure, BatchResponse, DeliveryRecord, MAX_BATCH_SIZE};
pub use notification::{EventKind, ObjectCreatedEvent};
pub use queue::DeliveryQueue;
pub use store::{GetObjectInput, ObjectStore, PutObjectInput, StoredObject};

#[cfg(any(test, feature = "mocks"))]
pub use queue::MockDeliveryQueue;
#[cfg(any(test, feature = "mocks"))]
pub use store::MockObjectStore;
