use anyhow::Result;
use uuid::Uuid;

use super::event::{DomainEvent, EventEnvelope};

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated before any event is produced
// 2. Events represent facts that have already happened
// 3. Aggregates enforce their own invariants
// 4. `version` is the optimistic concurrency token compared by the store
//
// `Aggregate` is what the store and outbox need to know about any aggregate.
// `EventSourced` is implemented by aggregates whose state can be rebuilt
// purely from their event history.
//
// ============================================================================

pub trait Aggregate: Sized + Send + Sync {
    type Event: DomainEvent;

    /// Stable name used in envelopes and outbox rows, e.g. "Order"
    fn aggregate_type() -> &'static str;

    fn aggregate_id(&self) -> Uuid;

    /// Optimistic concurrency token compared by the store on write
    fn version(&self) -> u64;

    /// Wrap freshly produced events for staging into the outbox
    fn envelope_events(
        &self,
        events: Vec<Self::Event>,
        correlation_id: Uuid,
    ) -> Vec<EventEnvelope<Self::Event>> {
        events
            .into_iter()
            .map(|event| {
                EventEnvelope::new(
                    Self::aggregate_type(),
                    self.aggregate_id(),
                    event,
                    correlation_id,
                )
            })
            .collect()
    }
}

pub trait EventSourced: Aggregate {
    type Command;
    type Error;

    /// Create new aggregate from first event
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Rebuild from event history
    fn load_from_events(events: &[EventEnvelope<Self::Event>]) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let (first, rest) = events
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("No events to load"))?;

        let mut aggregate = Self::apply_first_event(&first.event_data)
            .map_err(|e| anyhow::anyhow!("Failed to apply first event: {}", e))?;

        for envelope in rest {
            aggregate
                .apply_event(&envelope.event_data)
                .map_err(|e| anyhow::anyhow!("Failed to apply event: {}", e))?;
        }

        Ok(aggregate)
    }
}
