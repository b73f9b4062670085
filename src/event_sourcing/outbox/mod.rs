// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Events are written to the outbox in the same commit as the state change
// that produced them; the dispatcher publishes them afterwards.
//
// ============================================================================

mod dispatcher;
mod message;
mod publisher;

pub use dispatcher::{DispatchReport, OutboxDispatcher};
pub use message::OutboxMessage;
pub use publisher::{topic_for, EventPublisher, LoggingPublisher, RecordingPublisher};
