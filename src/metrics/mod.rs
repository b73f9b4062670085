use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Order placement (throughput, failures by kind, optimistic-lock retries)
// - Outbox dispatch (published events, publish failures)
// - Circuit breaker state per protected dependency
//
// Each service holds an `Arc<Metrics>`; `render()` produces the text
// exposition format for whatever scrapes it.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Placement Metrics
    pub orders_placed_total: IntCounter,
    pub order_placement_failures_total: IntCounterVec,
    pub order_placement_retries_total: IntCounter,
    pub order_placement_duration: Histogram,

    // Outbox Metrics
    pub outbox_events_published_total: IntCounterVec,
    pub outbox_publish_failures_total: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_placed_total =
            IntCounter::new("orders_placed_total", "Total orders placed successfully")?;
        registry.register(Box::new(orders_placed_total.clone()))?;

        let order_placement_failures_total = IntCounterVec::new(
            Opts::new(
                "order_placement_failures_total",
                "Total order placements that failed",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(order_placement_failures_total.clone()))?;

        let order_placement_retries_total = IntCounter::new(
            "order_placement_retries_total",
            "Placement attempts repeated after an optimistic-lock conflict",
        )?;
        registry.register(Box::new(order_placement_retries_total.clone()))?;

        let order_placement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_placement_duration_seconds",
                "Order placement duration including retries",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(order_placement_duration.clone()))?;

        let outbox_events_published_total = IntCounterVec::new(
            Opts::new(
                "outbox_events_published_total",
                "Total outbox events handed to the publisher",
            ),
            &["event_type"],
        )?;
        registry.register(Box::new(outbox_events_published_total.clone()))?;

        let outbox_publish_failures_total = IntCounterVec::new(
            Opts::new(
                "outbox_publish_failures_total",
                "Total outbox publish attempts that failed",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(outbox_publish_failures_total.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
            ),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_placed_total,
            order_placement_failures_total,
            order_placement_retries_total,
            order_placement_duration,
            outbox_events_published_total,
            outbox_publish_failures_total,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of everything registered
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_placed_total.inc();
        metrics
            .order_placement_failures_total
            .with_label_values(&["conflict"])
            .inc();
        metrics
            .circuit_breaker_state
            .with_label_values(&["outbox"])
            .set(0);

        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_render_contains_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_placed_total.inc_by(2);

        let text = metrics.render().unwrap();
        assert!(text.contains("orders_placed_total 2"));
    }
}
