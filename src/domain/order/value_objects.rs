use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ids::{ProductId, VariantId};
use crate::errors::FieldError;

// ============================================================================
// Order Value Objects
// ============================================================================

const MAX_ADDRESS_FIELD_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub city: String,
    pub district: String,
    pub neighborhood: String,
    pub address_line: String,
    pub label: String,
}

impl ShippingAddress {
    /// Every field is required; returns one error per offending field
    pub fn validate(&self) -> Vec<FieldError> {
        [
            ("shipping_address.recipient_name", &self.recipient_name),
            ("shipping_address.phone", &self.phone),
            ("shipping_address.city", &self.city),
            ("shipping_address.district", &self.district),
            ("shipping_address.neighborhood", &self.neighborhood),
            ("shipping_address.address_line", &self.address_line),
            ("shipping_address.label", &self.label),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            let len = value.trim().chars().count();
            if len == 0 {
                Some(FieldError::new(field, "is required"))
            } else if len > MAX_ADDRESS_FIELD_LEN {
                Some(FieldError::new(
                    field,
                    format!("must be at most {} characters", MAX_ADDRESS_FIELD_LEN),
                ))
            } else {
                None
            }
        })
        .collect()
    }
}

/// Price and naming snapshot of one purchased variant. Never updated after
/// the order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub product_slug: String,
    pub variant_name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward-only transition table; Cancelled is reachable from any
    /// non-terminal state
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Processing | Shipped, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient_name: "Ada Lovelace".into(),
            phone: "+44 20 7946 0000".into(),
            city: "London".into(),
            district: "Marylebone".into(),
            neighborhood: "Regent's Park".into(),
            address_line: "12 St John's Wood Rd".into(),
            label: "Home".into(),
        }
    }

    #[test]
    fn test_complete_address_is_valid() {
        assert!(address().validate().is_empty());
    }

    #[test]
    fn test_address_reports_each_missing_field() {
        let mut a = address();
        a.phone = " ".into();
        a.label = "".into();
        let fields: Vec<_> = a.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["shipping_address.phone", "shipping_address.label"]
        );
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            product_id: ProductId::new(),
            variant_id: VariantId::new(),
            product_name: "Shirt".into(),
            product_slug: "shirt".into(),
            variant_name: "Red".into(),
            sku: "A-RED".into(),
            quantity: 3,
            unit_price: dec!(9.99),
            image_url: None,
        };
        assert_eq!(item.line_total(), dec!(29.97));
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Shipped.can_transition_to(Cancelled));

        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_order_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::Shipped);
    }
}
