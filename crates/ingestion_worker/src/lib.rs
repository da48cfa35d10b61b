pub mod domain;
pub mod ingestion_worker;
pub mod queue;

pub use ingestion_worker::{IngestionWorker, IngestionWorkerConfig};
