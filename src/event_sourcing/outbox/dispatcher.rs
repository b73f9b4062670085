use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OutboxConfig;
use crate::metrics::Metrics;
use crate::store::{OutboxStore, StoreError};
use crate::utils::{CircuitBreaker, CircuitBreakerError};

use super::publisher::EventPublisher;

// ============================================================================
// Outbox Dispatcher
// ============================================================================
//
// Runs after commits, never inside them. Each round:
// 1. Fetch up to `batch_size` unpublished messages, oldest first
// 2. Publish each through the circuit breaker
// 3. Mark the successful ones published
//
// A failed message stays pending and blocks later messages of the same
// aggregate for this round, so per-aggregate order is kept. An open circuit
// ends the round early.
//
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub published: usize,
    pub failed: usize,
    pub deferred: usize,
}

pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxStore>,
    publisher: Arc<dyn EventPublisher>,
    circuit_breaker: CircuitBreaker,
    batch_size: usize,
    metrics: Arc<Metrics>,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        publisher: Arc<dyn EventPublisher>,
        config: &OutboxConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let gauge = metrics
            .circuit_breaker_state
            .with_label_values(&["outbox_publisher"]);
        let circuit_breaker =
            CircuitBreaker::new("outbox_publisher", config.circuit_breaker.clone())
                .with_gauge(gauge);

        Self {
            outbox,
            publisher,
            circuit_breaker,
            batch_size: config.batch_size.max(1),
            metrics,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub async fn dispatch_pending(&self) -> Result<DispatchReport, StoreError> {
        let pending = self.outbox.fetch_unpublished(self.batch_size).await?;
        let mut report = DispatchReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        let mut published: Vec<Uuid> = Vec::with_capacity(pending.len());
        let mut blocked: HashSet<Uuid> = HashSet::new();
        let total = pending.len();

        for (idx, message) in pending.iter().enumerate() {
            if blocked.contains(&message.aggregate_id) {
                report.deferred += 1;
                continue;
            }

            match self
                .circuit_breaker
                .call(self.publisher.publish(message))
                .await
            {
                Ok(()) => {
                    self.metrics
                        .outbox_events_published_total
                        .with_label_values(&[message.event_type.as_str()])
                        .inc();
                    published.push(message.id);
                }
                Err(CircuitBreakerError::CircuitOpen) => {
                    self.metrics
                        .outbox_publish_failures_total
                        .with_label_values(&["circuit_open"])
                        .inc();
                    report.deferred += total - idx;
                    tracing::warn!(
                        breaker = self.circuit_breaker.name(),
                        deferred = total - idx,
                        "Circuit open, deferring remaining outbox messages"
                    );
                    break;
                }
                Err(CircuitBreakerError::OperationFailed(e)) => {
                    self.metrics
                        .outbox_publish_failures_total
                        .with_label_values(&["publish_error"])
                        .inc();
                    tracing::warn!(
                        message_id = %message.id,
                        event_type = %message.event_type,
                        aggregate_id = %message.aggregate_id,
                        error = %e,
                        "Failed to publish outbox message"
                    );
                    self.outbox.record_failed_attempt(message.id).await?;
                    blocked.insert(message.aggregate_id);
                    report.failed += 1;
                }
            }
        }

        if !published.is_empty() {
            self.outbox.mark_published(&published).await?;
        }
        report.published = published.len();

        tracing::debug!(
            published = report.published,
            failed = report.failed,
            deferred = report.deferred,
            "Outbox dispatch round finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ProductDeleted, ProductEvent};
    use crate::domain::ids::ProductId;
    use crate::event_sourcing::core::{deserialize_event, EventEnvelope};
    use crate::event_sourcing::outbox::{OutboxMessage, RecordingPublisher};
    use crate::store::{InMemoryStore, Transaction, UnitOfWork};
    use crate::utils::{CircuitBreakerConfig, CircuitState};
    use std::time::Duration;

    async fn stage_deletes(store: &InMemoryStore, products: &[ProductId]) {
        let mut tx = Transaction::begin(store as &dyn UnitOfWork);
        for product_id in products {
            let envelope = EventEnvelope::new(
                "Product",
                product_id.as_uuid(),
                ProductEvent::Deleted(ProductDeleted {
                    product_id: *product_id,
                }),
                Uuid::new_v4(),
            );
            tx.stage_events(&[envelope]).unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn dispatcher(
        store: &InMemoryStore,
        publisher: Arc<RecordingPublisher>,
        failure_threshold: u32,
    ) -> OutboxDispatcher {
        let config = OutboxConfig {
            batch_size: 10,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold,
                timeout: Duration::from_secs(60),
                success_threshold: 1,
            },
        };
        OutboxDispatcher::new(
            Arc::new(store.clone()),
            publisher,
            &config,
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_dispatch_publishes_and_marks() {
        let store = InMemoryStore::new();
        let product = ProductId::new();
        stage_deletes(&store, &[product, ProductId::new()]).await;

        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = dispatcher(&store, publisher.clone(), 5);

        let report = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report.published, 2);
        assert_eq!(publisher.event_types(), vec!["ProductDeleted", "ProductDeleted"]);

        let first: OutboxMessage = publisher.published()[0].clone();
        let event: ProductEvent = deserialize_event(first.payload).unwrap();
        assert_eq!(event, ProductEvent::Deleted(ProductDeleted { product_id: product }));

        let again = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(again, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_failed_message_stays_pending() {
        let store = InMemoryStore::new();
        stage_deletes(&store, &[ProductId::new()]).await;

        let publisher = Arc::new(RecordingPublisher::new());
        publisher.fail_next(1);
        let dispatcher = dispatcher(&store, publisher.clone(), 5);

        let report = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(publisher.published().is_empty());

        let report = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(publisher.published()[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_open_circuit_defers_remaining() {
        let store = InMemoryStore::new();
        stage_deletes(&store, &[ProductId::new(), ProductId::new(), ProductId::new()]).await;

        let publisher = Arc::new(RecordingPublisher::new());
        publisher.fail_next(1);
        let dispatcher = dispatcher(&store, publisher.clone(), 1);

        let report = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(dispatcher.circuit_breaker().get_state().await, CircuitState::Open);
    }
}
