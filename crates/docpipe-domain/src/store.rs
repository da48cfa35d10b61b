use crate::error::DomainResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Input for writing an object into a container.
#[derive(Debug, Clone)]
pub struct PutObjectInput {
    pub container: String,
    pub key: String,
    pub body: Bytes,
}

/// Input for reading the current version of an object.
#[derive(Debug, Clone)]
pub struct GetObjectInput {
    pub container: String,
    pub key: String,
}

/// A committed object version.
///
/// Versions are immutable: a new write to the same key produces a new
/// `StoredObject` with a fresh version identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub container: String,
    pub key: String,
    pub version_id: String,
    pub body: Bytes,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Durable, versioned binary storage.
///
/// Data-plane operations only; container creation and notification wiring
/// are backend concerns.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Commit a new version of an object. Returns the stored version.
    async fn put_object(&self, input: PutObjectInput) -> DomainResult<StoredObject>;

    /// Fetch the current version of an object, or `None` if the key has
    /// never been written.
    async fn get_object(&self, input: GetObjectInput) -> DomainResult<Option<StoredObject>>;
}
