use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::event_sourcing::core::{serialize_event, DomainEvent, EventEnvelope};

/// One row of the transactional outbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub sequence_number: u64,
    pub event_type: String,
    pub event_version: i32,
    pub payload: serde_json::Value,
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl OutboxMessage {
    pub fn from_envelope<E: DomainEvent>(
        envelope: &EventEnvelope<E>,
    ) -> Result<Self, serde_json::Error> {
        let payload = serialize_event(&envelope.event_data)?;
        Ok(Self {
            id: Uuid::new_v4(),
            event_id: envelope.event_id,
            aggregate_type: envelope.aggregate_type.clone(),
            aggregate_id: envelope.aggregate_id,
            sequence_number: envelope.sequence_number,
            event_type: envelope.event_type.clone(),
            event_version: envelope.event_version,
            payload,
            causation_id: envelope.causation_id,
            correlation_id: envelope.correlation_id,
            user_id: envelope.user_id,
            metadata: envelope.metadata.clone(),
            created_at: Utc::now(),
            published_at: None,
            attempts: 0,
        })
    }

    /// Events of one aggregate share a key so consumers see them in order
    pub fn partition_key(&self) -> String {
        self.aggregate_id.to_string()
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ProductDeleted, ProductEvent};
    use crate::domain::ids::ProductId;

    #[test]
    fn test_from_envelope_keeps_metadata() {
        let product_id = ProductId::new();
        let correlation_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(
            "Product",
            product_id.as_uuid(),
            ProductEvent::Deleted(ProductDeleted { product_id }),
            correlation_id,
        )
        .with_user(Uuid::nil())
        .with_metadata("command", "Delete");

        let message = OutboxMessage::from_envelope(&envelope).unwrap();

        assert_eq!(message.event_id, envelope.event_id);
        assert_eq!(message.event_type, "ProductDeleted");
        assert_eq!(message.correlation_id, correlation_id);
        assert_eq!(message.partition_key(), product_id.to_string());
        assert_eq!(message.payload["type"], "Deleted");
        assert_eq!(message.user_id, Some(Uuid::nil()));
        assert_eq!(message.metadata["command"], "Delete");
        assert!(!message.is_published());
    }
}
