// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (ShippingAddress, OrderItem, OrderStatus)
// - Events (OrderPlaced, OrderStatusChanged)
// - Commands (ChangeStatus)
// - Errors (OrderError enum)
// - Aggregate (Order with the status table)
// - Placement workflow (OrderPlacementService)
// - Command Handler (OrderService)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod placement;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use placement::*;
pub use command_handler::*;
