use crate::errors::{join_fields, FieldError};

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("order items cannot be empty")]
    EmptyItems,

    #[error("invalid item quantity {quantity} for {sku}")]
    InvalidQuantity { sku: String, quantity: i64 },

    #[error("invalid unit price for {0}")]
    InvalidUnitPrice(String),

    #[error("invalid shipping address: {}", join_fields(.0))]
    InvalidAddress(Vec<FieldError>),

    #[error("cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("order is already {0}")]
    AlreadyInStatus(OrderStatus),

    #[error("aggregate not initialized")]
    NotInitialized,
}

impl OrderError {
    pub fn field(&self) -> &'static str {
        match self {
            OrderError::EmptyItems => "items",
            OrderError::InvalidQuantity { .. } => "quantity",
            OrderError::InvalidUnitPrice(_) => "unit_price",
            OrderError::InvalidAddress(_) => "shipping_address",
            OrderError::InvalidStatusTransition { .. } | OrderError::AlreadyInStatus(_) => {
                "status"
            }
            OrderError::NotInitialized => "order",
        }
    }
}
