use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PlacementConfig;
use crate::domain::catalog::{CatalogError, Product, ProductEvent};
use crate::domain::ids::{OrderId, PurchaserId, VariantId};
use crate::errors::{AppError, FieldError};
use crate::event_sourcing::core::{Aggregate, EventEnvelope};
use crate::metrics::Metrics;
use crate::store::{CatalogRepository, StoreError, Transaction, UnitOfWork};
use crate::utils::{retry_on_conflict, IsRetryable, RetryOutcome};

use super::aggregate::Order;
use super::value_objects::{OrderItem, ShippingAddress};

// ============================================================================
// Order Placement Workflow
// ============================================================================
//
// Each attempt runs inside its own transaction:
// 1. Batch-read every requested variant (all or nothing)
// 2. Check availability and stock for every line
// 3. Decrement tracked stock; every line's variant is staged with the
//    version it was read at
// 4. Snapshot price and names into immutable order items
// 5. Stage the order and its events, then commit
//
// A commit rejected on a stale variant version restarts the whole attempt
// against fresh state. Product price and activation edits bump the versions
// of every variant they affect, so those are caught the same way. Running out of attempts is a Conflict; any other
// failure is final.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub variant_id: VariantId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub purchaser_id: PurchaserId,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLineRequest>,
}

/// Outcome of a single attempt
#[derive(Debug, thiserror::Error)]
enum PlacementError {
    /// Business rejection or cancellation; final
    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CatalogError> for PlacementError {
    fn from(err: CatalogError) -> Self {
        PlacementError::Rejected(err.into())
    }
}

impl IsRetryable for PlacementError {
    fn is_retryable(&self) -> bool {
        matches!(self, PlacementError::Store(e) if e.is_concurrency_conflict())
    }
}

pub struct OrderPlacementService {
    catalog: Arc<dyn CatalogRepository>,
    uow: Arc<dyn UnitOfWork>,
    config: PlacementConfig,
    metrics: Arc<Metrics>,
}

impl OrderPlacementService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        uow: Arc<dyn UnitOfWork>,
        config: PlacementConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            catalog,
            uow,
            config,
            metrics,
        }
    }

    /// Place an order, retrying on optimistic-lock conflicts.
    ///
    /// `cancel` is honored at the variant fetch and right before commit; a
    /// cancelled placement rolls back and returns `AppError::Cancelled`.
    pub async fn place_order(
        &self,
        request: &PlaceOrderRequest,
        cancel: &CancellationToken,
    ) -> Result<OrderId, AppError> {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4();

        let result = self.place_with_retry(request, cancel, correlation_id).await;

        self.metrics
            .order_placement_duration
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(order_id) => {
                self.metrics.orders_placed_total.inc();
                tracing::info!(
                    order_id = %order_id,
                    purchaser_id = %request.purchaser_id,
                    lines = request.lines.len(),
                    correlation_id = %correlation_id,
                    "Order placed"
                );
            }
            Err(e) => {
                self.metrics
                    .order_placement_failures_total
                    .with_label_values(&[e.kind().as_str()])
                    .inc();
                tracing::warn!(
                    purchaser_id = %request.purchaser_id,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Order placement failed"
                );
            }
        }

        result
    }

    async fn place_with_retry(
        &self,
        request: &PlaceOrderRequest,
        cancel: &CancellationToken,
        correlation_id: Uuid,
    ) -> Result<OrderId, AppError> {
        let lines = merge_lines(&request.lines)?;
        let address_errors = request.shipping_address.validate();
        if !address_errors.is_empty() {
            return Err(AppError::Validation(address_errors));
        }

        let outcome = retry_on_conflict(&self.config.retry, |attempt| {
            if attempt > 1 {
                self.metrics.order_placement_retries_total.inc();
            }
            self.attempt(request, &lines, cancel, correlation_id)
        })
        .await;

        match outcome {
            RetryOutcome::Success(order_id) => Ok(order_id),
            RetryOutcome::Failed(PlacementError::Rejected(e)) => Err(e),
            RetryOutcome::Failed(PlacementError::Store(e)) => Err(e.into()),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::warn!(
                    attempts = attempts,
                    error = %last_error,
                    correlation_id = %correlation_id,
                    "Order placement gave up after repeated stock conflicts"
                );
                Err(AppError::Conflict(format!(
                    "stock changed concurrently; order not placed after {} attempts",
                    attempts
                )))
            }
        }
    }

    async fn attempt(
        &self,
        request: &PlaceOrderRequest,
        lines: &[(VariantId, u32)],
        cancel: &CancellationToken,
        correlation_id: Uuid,
    ) -> Result<OrderId, PlacementError> {
        let mut tx = Transaction::begin(self.uow.as_ref());
        let variant_ids: Vec<VariantId> = lines.iter().map(|(id, _)| *id).collect();

        let mut products = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tx.rollback("cancelled during variant fetch");
                return Err(AppError::Cancelled.into());
            }
            fetched = self.catalog.find_products_by_variant_ids(&variant_ids) => fetched?,
        };

        let owner = index_owners(&products);
        if let Some((missing, _)) = lines.iter().find(|(id, _)| !owner.contains_key(id)) {
            tx.rollback("variant not found");
            return Err(AppError::not_found("variant", missing).into());
        }

        // Nothing is mutated until every line passes
        for (variant_id, quantity) in lines {
            let product = &products[owner[variant_id]];
            let variant = product
                .variant(*variant_id)
                .ok_or_else(|| AppError::not_found("variant", variant_id))?;

            if !product.is_available() || !variant.is_active() {
                return Err(AppError::Conflict(format!(
                    "variant {} is not available",
                    variant.sku()
                ))
                .into());
            }
            if !variant.can_fulfil(*quantity) {
                return Err(CatalogError::InsufficientStock {
                    sku: variant.sku().to_string(),
                    requested: *quantity,
                    available: variant.stock_quantity(),
                }
                .into());
            }
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut stock_events: Vec<EventEnvelope<ProductEvent>> = Vec::new();

        for (variant_id, quantity) in lines {
            let product = &mut products[owner[variant_id]];
            let (read_version, tracked) = product
                .variant(*variant_id)
                .map(|v| (v.version(), v.tracks_inventory()))
                .ok_or_else(|| AppError::not_found("variant", variant_id))?;

            if tracked {
                let event = product.decrease_stock(*variant_id, *quantity)?;
                stock_events.extend(product.envelope_events(vec![event], correlation_id));
            }
            // Untracked variants are staged unchanged so the commit still
            // verifies the price and availability this attempt read
            let staged = product
                .variant(*variant_id)
                .cloned()
                .ok_or_else(|| AppError::not_found("variant", variant_id))?;
            tx.stage_stock(product.id(), staged, read_version);

            items.push(snapshot_item(product, *variant_id, *quantity)?);
        }

        let (order, placed) = Order::place(
            request.purchaser_id,
            request.shipping_address.clone(),
            items,
        )
        .map_err(AppError::from)?;
        let order_id = order.id();
        let purchaser = request.purchaser_id.as_uuid();
        let order_events: Vec<_> = order
            .envelope_events(vec![placed], correlation_id)
            .into_iter()
            .map(|e| e.with_user(purchaser))
            .collect();
        let stock_events: Vec<_> = stock_events
            .into_iter()
            .map(|e| e.with_user(purchaser).with_causation(order_id.as_uuid()))
            .collect();

        tx.stage_new_order(order);
        tx.stage_events(&stock_events)?;
        tx.stage_events(&order_events)?;

        if cancel.is_cancelled() {
            tx.rollback("cancelled before commit");
            return Err(AppError::Cancelled.into());
        }

        tx.commit().await?;
        Ok(order_id)
    }
}

/// Reject malformed lines before any I/O and fold repeated variants into one
/// line, keeping first-seen order
fn merge_lines(lines: &[OrderLineRequest]) -> Result<Vec<(VariantId, u32)>, AppError> {
    if lines.is_empty() {
        return Err(AppError::validation("lines", "at least one order line is required"));
    }

    let mut errors = Vec::new();
    let mut merged: Vec<(VariantId, u32)> = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let quantity = match u32::try_from(line.quantity) {
            Ok(q) if q > 0 => q,
            _ => {
                errors.push(FieldError::new(
                    format!("lines[{idx}].quantity"),
                    "must be a positive whole number",
                ));
                continue;
            }
        };

        match merged.iter_mut().find(|(id, _)| *id == line.variant_id) {
            Some((_, total)) => match total.checked_add(quantity) {
                Some(sum) => *total = sum,
                None => errors.push(FieldError::new(
                    format!("lines[{idx}].quantity"),
                    "combined quantity is too large",
                )),
            },
            None => merged.push((line.variant_id, quantity)),
        }
    }

    if errors.is_empty() {
        Ok(merged)
    } else {
        Err(AppError::Validation(errors))
    }
}

fn index_owners(products: &[Product]) -> HashMap<VariantId, usize> {
    products
        .iter()
        .enumerate()
        .flat_map(|(idx, p)| p.variants().iter().map(move |v| (v.id(), idx)))
        .collect()
}

fn snapshot_item(
    product: &Product,
    variant_id: VariantId,
    quantity: u32,
) -> Result<OrderItem, AppError> {
    let variant = product
        .variant(variant_id)
        .ok_or_else(|| AppError::not_found("variant", variant_id))?;

    Ok(OrderItem {
        product_id: product.id(),
        variant_id,
        product_name: product.name().to_string(),
        product_slug: product.slug().to_string(),
        variant_name: variant.name().to_string(),
        sku: variant.sku().to_string(),
        quantity,
        unit_price: variant.effective_price(product.base_price()),
        image_url: product.main_image().map(|i| i.url.clone()),
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
