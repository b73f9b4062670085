// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// Aggregates reference each other only through the identities in `ids`.
// This layer depends on the store contracts, never on a store implementation.
//
// ============================================================================

pub mod ids;
pub mod catalog;
pub mod order;
