use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Upper bound on how many messages one handler invocation may receive.
pub const MAX_BATCH_SIZE: usize = 10;

/// One message as delivered by a queue receive call.
///
/// The receipt handle is unique per delivery: a redelivered message carries a
/// fresh handle and the previous one goes stale.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: Bytes,
    /// Approximate number of times this message has been delivered, this
    /// delivery included.
    pub receive_count: u32,
}

/// An ordered collection of records handed to one handler invocation.
///
/// Delivery of the batch is atomic; its outcome is not — each record settles
/// individually through [`BatchResponse`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    pub records: Vec<DeliveryRecord>,
}

impl Batch {
    pub fn new(records: Vec<DeliveryRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Names one message within a batch that failed processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

impl BatchItemFailure {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            item_identifier: message_id.into(),
        }
    }
}

/// Partial-failure report returned by a batch handler.
///
/// A record not named here is treated as fully and successfully processed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    /// A report with no failures: the whole batch succeeded.
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_failures(failures: Vec<BatchItemFailure>) -> Self {
        Self {
            batch_item_failures: failures,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.batch_item_failures.is_empty()
    }
}
