// ============================================================================
// Event Sourcing Core - Generic Abstractions
// ============================================================================
//
// No domain-specific code lives here; catalog and order aggregates plug in
// through the traits below.
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::{Aggregate, EventSourced};
pub use event::{deserialize_event, serialize_event, DomainEvent, EventEnvelope};
