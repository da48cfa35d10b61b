use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Object not found: {container}/{key}")]
    ObjectNotFound { container: String, key: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Stale receipt handle: {0}")]
    StaleReceiptHandle(String),

    #[error("Malformed notification payload: {0}")]
    MalformedNotification(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
