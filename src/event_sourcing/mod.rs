// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable pieces. Domain-specific code is in src/domain/
//
// ============================================================================

pub mod core;
pub mod outbox;
