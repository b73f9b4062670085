use std::sync::Arc;
use uuid::Uuid;

use crate::domain::ids::{OrderId, PurchaserId};
use crate::errors::AppError;
use crate::event_sourcing::core::Aggregate;
use crate::store::{OrderRepository, Transaction, UnitOfWork};

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: load → command → events → stage order + outbox → commit
//
// ============================================================================

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    uow: Arc<dyn UnitOfWork>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, uow: Arc<dyn UnitOfWork>) -> Self {
        Self { orders, uow }
    }

    /// Move an order along the status table; returns the new order version
    pub async fn change_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        correlation_id: Uuid,
    ) -> Result<u64, AppError> {
        let mut order = self.load(order_id).await?;
        let expected_version = order.version();
        let from = order.status();

        let events = order.execute(&OrderCommand::ChangeStatus { status })?;
        let envelopes = order.envelope_events(events, correlation_id);
        let new_version = order.version();

        let mut tx = Transaction::begin(self.uow.as_ref());
        tx.stage_order(order, expected_version);
        tx.stage_events(&envelopes)?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %status,
            version = new_version,
            "Order status changed"
        );
        Ok(new_version)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, AppError> {
        self.load(order_id).await
    }

    pub async fn list_for_purchaser(
        &self,
        purchaser_id: PurchaserId,
    ) -> Result<Vec<Order>, AppError> {
        Ok(self.orders.list_orders_for_purchaser(purchaser_id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, AppError> {
        Ok(self.orders.list_orders().await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, AppError> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("order", order_id))
    }
}
