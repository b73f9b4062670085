use prometheus::IntGauge;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Wraps calls to the event publisher. `failure_threshold` consecutive
// failures open the circuit; while open every call is refused without
// touching the publisher. Once `timeout` has passed the next call is let
// through as a trial (HalfOpen): `success_threshold` trial successes close
// the circuit, a single trial failure opens it again.
//
// Gauge values: 0 = Closed, 1 = Open, 2 = HalfOpen
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn as_gauge(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long an open circuit refuses calls
    pub timeout: Duration,
    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

/// Counters behind the lock; every method returns the new state when it changed
#[derive(Debug)]
struct Tally {
    state: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
}

impl Tally {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trial_successes: 0,
            opened_at: None,
        }
    }

    /// None when the call must be refused
    fn admit(&mut self, timeout: Duration) -> Option<Option<CircuitState>> {
        match self.state {
            CircuitState::Open => {
                let cooled = self.opened_at.map_or(true, |at| at.elapsed() >= timeout);
                if !cooled {
                    return None;
                }
                self.state = CircuitState::HalfOpen;
                self.trial_successes = 0;
                Some(Some(CircuitState::HalfOpen))
            }
            _ => Some(None),
        }
    }

    fn succeeded(&mut self, config: &CircuitBreakerConfig) -> Option<CircuitState> {
        self.consecutive_failures = 0;
        if self.state != CircuitState::HalfOpen {
            return None;
        }
        self.trial_successes += 1;
        if self.trial_successes < config.success_threshold {
            return None;
        }
        *self = Self::closed();
        Some(CircuitState::Closed)
    }

    fn failed(&mut self, config: &CircuitBreakerConfig) -> Option<CircuitState> {
        self.consecutive_failures += 1;
        let trips = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.consecutive_failures >= config.failure_threshold,
            CircuitState::Open => false,
        };
        if !trips {
            return None;
        }
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.trial_successes = 0;
        Some(CircuitState::Open)
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    tally: Arc<Mutex<Tally>>,
    gauge: Option<IntGauge>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            tally: Arc::new(Mutex::new(Tally::closed())),
            gauge: None,
        }
    }

    /// Mirror state changes into `gauge`
    pub fn with_gauge(mut self, gauge: IntGauge) -> Self {
        gauge.set(CircuitState::Closed.as_gauge());
        self.gauge = Some(gauge);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn get_state(&self) -> CircuitState {
        self.tally.lock().await.state
    }

    pub async fn call<Fut, T, E>(&self, operation: Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let admitted = self.tally.lock().await.admit(self.config.timeout);
        match admitted {
            None => return Err(CircuitBreakerError::CircuitOpen),
            Some(change) => self.observe(change),
        }

        let result = operation.await;

        let change = {
            let mut tally = self.tally.lock().await;
            match &result {
                Ok(_) => tally.succeeded(&self.config),
                Err(_) => tally.failed(&self.config),
            }
        };
        self.observe(change);

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    fn observe(&self, change: Option<CircuitState>) {
        let Some(state) = change else { return };
        if let Some(gauge) = &self.gauge {
            gauge.set(state.as_gauge());
        }
        match state {
            CircuitState::Open => tracing::warn!(breaker = self.name, "Circuit opened"),
            CircuitState::HalfOpen => tracing::info!(breaker = self.name, "Circuit half-open, letting a trial call through"),
            CircuitState::Closed => tracing::info!(breaker = self.name, "Circuit closed"),
        }
    }
}
