// ============================================================================
// storefront_core
// ============================================================================
//
// Catalog and order-placement core for a storefront backend:
// - domain/          Product catalog and Order aggregates, placement workflow
// - store/           Collaborator contracts, unit of work, in-memory store
// - event_sourcing/  Event envelopes, aggregate traits, transactional outbox
// - utils/           Bounded retry, circuit breaker
// - metrics/         Prometheus registry
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod errors;
pub mod event_sourcing;
pub mod metrics;
pub mod store;
pub mod utils;
