// ============================================================================
// Persistence Contracts
// ============================================================================
//
// Repositories are read-only; every write goes through a `Transaction` that
// stages aggregates, stock updates and outbox messages into one `WriteBatch`
// and hands it to `UnitOfWork::commit`, which applies all of it or none of it.
//
// Optimistic concurrency:
// - a staged product carries the `VersionSnapshot` it was loaded with
// - a staged stock update carries the variant version it was read at
// - a staged order carries the order version it was loaded at
// Any mismatch rejects the whole batch with `ConcurrencyConflict`.
//
// ============================================================================

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::{Category, Product, ProductVariant, Sku, VariationType, VersionSnapshot};
use crate::domain::ids::{
    CategoryId, OrderId, ProductId, PurchaserId, VariantId, VariantOptionId, VariationTypeId,
};
use crate::domain::order::Order;
use crate::event_sourcing::core::{DomainEvent, EventEnvelope};
use crate::event_sourcing::outbox::OutboxMessage;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("{entity} {key} already exists")]
    DuplicateKey { entity: &'static str, key: String },

    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: Uuid },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// ============================================================================
// Collaborator Contracts
// ============================================================================

#[async_trait]
pub trait CategoryLookup: Send + Sync {
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;
}

/// Reads never return soft-deleted products
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Single batch read of every product owning one of `variant_ids`
    async fn find_products_by_variant_ids(
        &self,
        variant_ids: &[VariantId],
    ) -> Result<Vec<Product>, StoreError>;

    /// Global SKU check, deleted products included
    async fn sku_exists(&self, sku: &Sku) -> Result<bool, StoreError>;

    async fn slug_exists(
        &self,
        slug: &str,
        excluding: Option<ProductId>,
    ) -> Result<bool, StoreError>;

    async fn get_variation_type(
        &self,
        id: VariationTypeId,
    ) -> Result<Option<VariationType>, StoreError>;

    async fn find_variation_types(
        &self,
        ids: &[VariationTypeId],
    ) -> Result<Vec<VariationType>, StoreError>;

    async fn variation_type_name_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// True when any variant of any product selects this option
    async fn option_in_use(&self, option_id: VariantOptionId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn list_orders_for_purchaser(
        &self,
        purchaser_id: PurchaserId,
    ) -> Result<Vec<Order>, StoreError>;

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Oldest unpublished messages first
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError>;

    async fn mark_published(&self, ids: &[Uuid]) -> Result<(), StoreError>;

    async fn record_failed_attempt(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Apply the whole batch atomically, or reject it without side effects
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

// ============================================================================
// Write Batch
// ============================================================================

#[derive(Debug)]
pub struct ProductWrite {
    pub product: Product,
    /// None for a product that must not exist yet
    pub expected: Option<VersionSnapshot>,
}

#[derive(Debug)]
pub struct StockWrite {
    pub product_id: ProductId,
    pub variant: ProductVariant,
    pub expected_version: u64,
}

#[derive(Debug)]
pub struct VariationTypeWrite {
    pub variation_type: VariationType,
    pub is_new: bool,
}

#[derive(Debug)]
pub struct OrderWrite {
    pub order: Order,
    /// None for a newly placed order
    pub expected_version: Option<u64>,
}

#[derive(Debug, Default)]
pub struct WriteBatch {
    pub products: Vec<ProductWrite>,
    pub stock: Vec<StockWrite>,
    pub variation_types: Vec<VariationTypeWrite>,
    pub orders: Vec<OrderWrite>,
    pub outbox: Vec<OutboxMessage>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.stock.is_empty()
            && self.variation_types.is_empty()
            && self.orders.is_empty()
            && self.outbox.is_empty()
    }
}

// ============================================================================
// Transaction - scoped unit of work
// ============================================================================
//
// Nothing reaches the store before `commit`, so dropping a transaction on
// any exit path (early return, `?`, panic, cancellation) is a rollback.
//
// ============================================================================

pub struct Transaction<'a> {
    id: Uuid,
    uow: &'a dyn UnitOfWork,
    batch: WriteBatch,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(uow: &'a dyn UnitOfWork) -> Self {
        let id = Uuid::new_v4();
        tracing::trace!(transaction_id = %id, "Transaction started");
        Self {
            id,
            uow,
            batch: WriteBatch::default(),
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage_new_product(&mut self, product: Product) {
        self.batch.products.push(ProductWrite {
            product,
            expected: None,
        });
    }

    pub fn stage_product(&mut self, product: Product, expected: VersionSnapshot) {
        self.batch.products.push(ProductWrite {
            product,
            expected: Some(expected),
        });
    }

    pub fn stage_stock(&mut self, product_id: ProductId, variant: ProductVariant, expected_version: u64) {
        self.batch.stock.push(StockWrite {
            product_id,
            variant,
            expected_version,
        });
    }

    pub fn stage_variation_type(&mut self, variation_type: VariationType, is_new: bool) {
        self.batch.variation_types.push(VariationTypeWrite {
            variation_type,
            is_new,
        });
    }

    pub fn stage_new_order(&mut self, order: Order) {
        self.batch.orders.push(OrderWrite {
            order,
            expected_version: None,
        });
    }

    pub fn stage_order(&mut self, order: Order, expected_version: u64) {
        self.batch.orders.push(OrderWrite {
            order,
            expected_version: Some(expected_version),
        });
    }

    /// Serialize envelopes into outbox rows committed with the state change
    pub fn stage_events<E: DomainEvent>(
        &mut self,
        envelopes: &[EventEnvelope<E>],
    ) -> Result<(), StoreError> {
        for envelope in envelopes {
            self.batch.outbox.push(OutboxMessage::from_envelope(envelope)?);
        }
        Ok(())
    }

    pub async fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        let batch = std::mem::take(&mut self.batch);
        let staged_events = batch.outbox.len();

        match self.uow.commit(batch).await {
            Ok(()) => {
                tracing::debug!(
                    transaction_id = %self.id,
                    staged_events = staged_events,
                    "Transaction committed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    transaction_id = %self.id,
                    error = %e,
                    "Commit rejected, transaction rolled back"
                );
                Err(e)
            }
        }
    }

    pub fn rollback(mut self, reason: &str) {
        self.finished = true;
        tracing::debug!(transaction_id = %self.id, reason = reason, "Transaction rolled back");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                transaction_id = %self.id,
                "Transaction dropped without commit, rolled back"
            );
        }
    }
}
