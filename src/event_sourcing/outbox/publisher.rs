use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::message::OutboxMessage;

// ============================================================================
// Event Publisher - the outward seam of the outbox
// ============================================================================
//
// Delivery is at-least-once: a message may be handed over again if marking
// it published fails, so consumers deduplicate on `event_id`.
//
// ============================================================================

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: &OutboxMessage) -> anyhow::Result<()>;
}

/// Topic an aggregate's events are routed to, e.g. "product-events"
pub fn topic_for(aggregate_type: &str) -> String {
    format!("{}-events", aggregate_type.to_lowercase())
}

/// Writes each event to the log; the default when no broker is wired in
#[derive(Debug, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, message: &OutboxMessage) -> anyhow::Result<()> {
        let payload = message.to_json()?;
        tracing::info!(
            topic = %topic_for(&message.aggregate_type),
            key = %message.partition_key(),
            event_type = %message.event_type,
            event_id = %message.event_id,
            payload = %payload,
            "Published event"
        );
        Ok(())
    }
}

/// Keeps everything it is given; can be told to fail the next N calls
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<OutboxMessage>>,
    failures_remaining: AtomicU32,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<OutboxMessage> {
        match self.published.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_types(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|m| m.event_type)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, message: &OutboxMessage) -> anyhow::Result<()> {
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            anyhow::bail!("simulated publish failure for {}", message.event_id);
        }

        let mut published = match self.published.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        published.push(message.clone());
        Ok(())
    }
}
