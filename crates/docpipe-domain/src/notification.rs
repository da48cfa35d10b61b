use crate::error::{DomainError, DomainResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Kind of store event carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "object:created")]
    ObjectCreated,
}

/// Wire payload emitted by the object store when a write commits.
///
/// Ephemeral — it exists only as a queue message body, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCreatedEvent {
    pub event: EventKind,
    pub container: String,
    pub key: String,
    pub version_id: String,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl ObjectCreatedEvent {
    pub fn encode(&self) -> DomainResult<Bytes> {
        let raw = serde_json::to_vec(self)
            .map_err(|e| DomainError::MalformedNotification(e.to_string()))?;
        Ok(Bytes::from(raw))
    }

    pub fn decode(body: &Bytes) -> DomainResult<Self> {
        serde_json::from_slice(body).map_err(|e| DomainError::MalformedNotification(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ObjectCreatedEvent {
        ObjectCreatedEvent {
            event: EventKind::ObjectCreated,
            container: "master-documents".to_string(),
            key: "reports/q3.pdf".to_string(),
            version_id: "v-123".to_string(),
            occurred_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn encodes_event_kind_as_tagged_string() {
        let body = sample_event().encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["event"], "object:created");
        assert_eq!(value["container"], "master-documents");
        assert_eq!(value["versionId"], "v-123");
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = ObjectCreatedEvent::decode(&Bytes::from_static(b"not json")).unwrap_err();
        assert!(matches!(err, DomainError::MalformedNotification(_)));
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err =
            ObjectCreatedEvent::decode(&Bytes::from_static(b"{\"container\":\"c\"}")).unwrap_err();
        assert!(matches!(err, DomainError::MalformedNotification(_)));
    }
}
