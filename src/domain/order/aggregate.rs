use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ids::{OrderId, PurchaserId};
use crate::event_sourcing::core::{Aggregate, EventSourced};

use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{OrderItem, OrderStatus, ShippingAddress};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// State is derived from events: `place` validates and produces OrderPlaced,
// status commands produce OrderStatusChanged. `version` counts applied
// events and doubles as the optimistic concurrency token.
//
// The total is never stored; it is always recomputed from the items.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    version: u64,

    purchaser_id: PurchaserId,
    shipping_address: ShippingAddress,
    items: Vec<OrderItem>,
    status: OrderStatus,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate and build a new Pending order from price snapshots
    pub fn place(
        purchaser_id: PurchaserId,
        shipping_address: ShippingAddress,
        items: Vec<OrderItem>,
    ) -> Result<(Self, OrderEvent), OrderError> {
        let address_errors = shipping_address.validate();
        if !address_errors.is_empty() {
            return Err(OrderError::InvalidAddress(address_errors));
        }
        Self::validate_items(&items)?;

        let event = OrderEvent::Placed(OrderPlaced {
            order_id: OrderId::new(),
            purchaser_id,
            shipping_address,
            items,
            placed_at: Utc::now(),
        });
        let order = Self::apply_first_event(&event)?;
        Ok((order, event))
    }

    /// Run a command and apply the resulting events to `self`
    pub fn execute(&mut self, command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let events = self.handle_command(command)?;
        for event in &events {
            self.apply_event(event)?;
        }
        Ok(events)
    }

    fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for item in items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    sku: item.sku.clone(),
                    quantity: 0,
                });
            }
            if item.unit_price <= Decimal::ZERO {
                return Err(OrderError::InvalidUnitPrice(item.sku.clone()));
            }
        }

        Ok(())
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn purchaser_id(&self) -> PurchaserId {
        self.purchaser_id
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl EventSourced for Order {
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Placed(e) => Ok(Self {
                id: e.order_id,
                version: 1,
                purchaser_id: e.purchaser_id,
                shipping_address: e.shipping_address.clone(),
                items: e.items.clone(),
                status: OrderStatus::Pending,
                created_at: e.placed_at,
                updated_at: e.placed_at,
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Placed(_) => return Err(OrderError::NotInitialized),
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                self.updated_at = e.changed_at;
            }
        }
        self.version += 1;
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::ChangeStatus { status } => {
                let status = *status;
                if status == self.status {
                    return Err(OrderError::AlreadyInStatus(status));
                }
                if !self.status.can_transition_to(status) {
                    return Err(OrderError::InvalidStatusTransition {
                        from: self.status,
                        to: status,
                    });
                }

                Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
                    from: self.status,
                    to: status,
                    changed_at: Utc::now(),
                })])
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{ProductId, VariantId};
    use crate::event_sourcing::core::EventEnvelope;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient_name: "Ada Lovelace".into(),
            phone: "555-0100".into(),
            city: "London".into(),
            district: "Camden".into(),
            neighborhood: "Primrose Hill".into(),
            address_line: "1 Chalcot Sq".into(),
            label: "Home".into(),
        }
    }

    fn item(sku: &str, quantity: u32, unit_price: Decimal) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(),
            variant_id: VariantId::new(),
            product_name: "Linen Shirt".into(),
            product_slug: "linen-shirt".into(),
            variant_name: sku.to_lowercase(),
            sku: sku.into(),
            quantity,
            unit_price,
            image_url: None,
        }
    }

    fn placed() -> Order {
        let (order, _) = Order::place(
            PurchaserId::new(),
            address(),
            vec![item("A-RED", 2, dec!(10.00)), item("A-BLUE", 1, dec!(12.50))],
        )
        .unwrap();
        order
    }

    #[test]
    fn test_place_order() {
        let order = placed();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.version(), 1);
        assert_eq!(order.total_amount(), dec!(32.50));
    }

    #[test]
    fn test_place_rejects_bad_input() {
        assert_eq!(
            Order::place(PurchaserId::new(), address(), vec![]).unwrap_err(),
            OrderError::EmptyItems
        );
        assert!(matches!(
            Order::place(PurchaserId::new(), address(), vec![item("X", 0, dec!(1))]),
            Err(OrderError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            Order::place(PurchaserId::new(), address(), vec![item("X", 1, dec!(0))]),
            Err(OrderError::InvalidUnitPrice(_))
        ));

        let mut bad = address();
        bad.city = "".into();
        assert!(matches!(
            Order::place(PurchaserId::new(), bad, vec![item("X", 1, dec!(1))]),
            Err(OrderError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_status_lifecycle() {
        let mut order = placed();
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            order
                .execute(&OrderCommand::ChangeStatus { status })
                .unwrap();
        }
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.version(), 4);

        let err = order
            .execute(&OrderCommand::ChangeStatus {
                status: OrderStatus::Pending,
            })
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            }
        );
        assert_eq!(order.version(), 4);
    }

    #[test]
    fn test_same_status_is_rejected() {
        let order = placed();
        let err = order
            .handle_command(&OrderCommand::ChangeStatus {
                status: OrderStatus::Pending,
            })
            .unwrap_err();
        assert_eq!(err, OrderError::AlreadyInStatus(OrderStatus::Pending));
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        let mut order = placed();
        order
            .execute(&OrderCommand::ChangeStatus {
                status: OrderStatus::Cancelled,
            })
            .unwrap();
        assert!(order.status().is_terminal());
    }

    #[test]
    fn test_load_from_events_rebuilds_state() {
        let (mut order, placed_event) =
            Order::place(PurchaserId::new(), address(), vec![item("A", 1, dec!(5))]).unwrap();
        let mut history = vec![placed_event];
        history.extend(
            order
                .execute(&OrderCommand::ChangeStatus {
                    status: OrderStatus::Processing,
                })
                .unwrap(),
        );

        let envelopes: Vec<_> = history
            .into_iter()
            .map(|e| EventEnvelope::new("Order", order.aggregate_id(), e, Uuid::new_v4()))
            .collect();
        let rebuilt = Order::load_from_events(&envelopes).unwrap();

        assert_eq!(rebuilt, order);
    }

    proptest! {
        #[test]
        fn prop_total_equals_sum_of_lines(
            lines in prop::collection::vec((1u32..50, 1i64..100_000), 1..8),
            steps in 0usize..4
        ) {
            let items: Vec<_> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, cents))| item(&format!("SKU-{i}"), *qty, Decimal::new(*cents, 2)))
                .collect();
            let expected: Decimal = items
                .iter()
                .map(|i| i.unit_price * Decimal::from(i.quantity))
                .sum();

            let (mut order, _) = Order::place(PurchaserId::new(), address(), items).unwrap();
            prop_assert_eq!(order.total_amount(), expected);

            let path = [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered];
            for status in path.into_iter().take(steps) {
                order.execute(&OrderCommand::ChangeStatus { status }).unwrap();
                prop_assert_eq!(order.total_amount(), expected);
            }
        }
    }
}
