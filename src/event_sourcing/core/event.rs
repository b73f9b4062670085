use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps a domain event with identity, ordering and tracing metadata. The
// envelope is what gets staged into the outbox next to the state change.
// `sequence_number` is 0 until the store assigns the next position in the
// aggregate's stream at commit.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub sequence_number: u64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Causation & Correlation
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    // Actor Information
    pub user_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,

    pub metadata: HashMap<String, String>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_type: &str,
        aggregate_id: Uuid,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
            sequence_number: 0,
            event_type: event_data.event_type().to_string(),
            event_version: event_data.event_version(),
            event_data,
            causation_id: None,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_causation(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Implemented by each aggregate's event enum. The type name is taken from
/// the variant so one enum can carry many event kinds.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn event_type(&self) -> &'static str;

    fn event_version(&self) -> i32 {
        1
    }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

/// Payload form stored in the outbox
pub fn serialize_event<E: Serialize>(event: &E) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(event)
}

pub fn deserialize_event<E: DeserializeOwned>(value: serde_json::Value) -> serde_json::Result<E> {
    serde_json::from_value(value)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct TestEvent {
        data: String,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "TestEvent"
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            "Test",
            aggregate_id,
            TestEvent {
                data: "test".to_string(),
            },
            correlation_id,
        )
        .with_metadata("source", "unit-test");

        assert_eq!(envelope.aggregate_type, "Test");
        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 0);
        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.metadata["source"], "unit-test");
    }

    #[test]
    fn test_event_serialization() {
        let event = TestEvent {
            data: "test data".to_string(),
        };

        let json = serialize_event(&event).unwrap();
        let deserialized: TestEvent = deserialize_event(json).unwrap();

        assert_eq!(deserialized, event);
    }
}
