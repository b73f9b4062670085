use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{OrderId, PurchaserId};
use crate::event_sourcing::core::DomainEvent;

use super::value_objects::{OrderItem, OrderStatus, ShippingAddress};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    StatusChanged(OrderStatusChanged),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Full snapshot of the order; the aggregate can be rebuilt from it alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub purchaser_id: PurchaserId,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}
