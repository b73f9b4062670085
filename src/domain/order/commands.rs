use super::value_objects::OrderStatus;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================
//
// Placement is not a command on an existing aggregate: it spans the catalog
// and lives in `placement.rs`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    ChangeStatus { status: OrderStatus },
}
