use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::catalog::{Category, Product, Sku, VariationType};
use crate::domain::ids::{
    CategoryId, OrderId, ProductId, PurchaserId, VariantId, VariantOptionId, VariationTypeId,
};
use crate::domain::order::Order;
use crate::event_sourcing::core::Aggregate;
use crate::event_sourcing::outbox::OutboxMessage;

use super::*;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Implements every repository contract plus `UnitOfWork` over one shared
// state behind a tokio RwLock. `commit` verifies every version token and
// unique key under the write lock before applying anything, so a rejected
// batch leaves no trace.
//
// ============================================================================

#[derive(Default)]
struct StoreState {
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    variant_index: HashMap<VariantId, ProductId>,
    variation_types: HashMap<VariationTypeId, VariationType>,
    orders: HashMap<OrderId, Order>,
    outbox: Vec<OutboxMessage>,
    stream_positions: HashMap<Uuid, u64>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Categories are owned by an outer collaborator; this seeds them
    pub async fn insert_category(&self, category: Category) {
        self.state
            .write()
            .await
            .categories
            .insert(category.id, category);
    }

    /// Make every call fail with `Unavailable` until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store switched off".into()))
        } else {
            Ok(())
        }
    }
}

/// Slugs and SKUs must also be unique among the products staged together;
/// the stored-state checks cannot see the other writes of the same batch
fn check_batch_unique_keys(batch: &WriteBatch) -> Result<(), StoreError> {
    let mut slugs: HashMap<&str, ProductId> = HashMap::new();
    let mut skus: HashMap<&str, ProductId> = HashMap::new();

    for product in batch.products.iter().map(|w| &w.product) {
        let id = product.id();
        if !product.is_deleted() {
            if let Some(owner) = slugs.insert(product.slug(), id) {
                if owner != id {
                    return Err(StoreError::DuplicateKey {
                        entity: "product slug",
                        key: product.slug().to_string(),
                    });
                }
            }
        }
        for variant in product.variants() {
            if let Some(owner) = skus.insert(variant.sku().as_str(), id) {
                if owner != id {
                    return Err(StoreError::DuplicateKey {
                        entity: "sku",
                        key: variant.sku().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

impl StoreState {
    fn live_product(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id).filter(|p| !p.is_deleted())
    }

    // ------------------------------------------------------------------------
    // Commit validation (read-only)
    // ------------------------------------------------------------------------

    fn check_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        check_batch_unique_keys(batch)?;
        for write in &batch.products {
            self.check_product_write(write)?;
        }
        for write in &batch.stock {
            self.check_stock_write(write)?;
        }
        for write in &batch.variation_types {
            self.check_variation_type_write(write)?;
        }
        for write in &batch.orders {
            self.check_order_write(write)?;
        }
        Ok(())
    }

    fn check_product_write(&self, write: &ProductWrite) -> Result<(), StoreError> {
        let product = &write.product;
        let id = product.id();

        match (&write.expected, self.products.get(&id)) {
            (None, Some(_)) => {
                return Err(StoreError::DuplicateKey {
                    entity: "product",
                    key: id.to_string(),
                })
            }
            (Some(_), None) => {
                return Err(StoreError::Missing {
                    entity: "product",
                    id: id.as_uuid(),
                })
            }
            (Some(expected), Some(stored)) => {
                if stored.version() != expected.product_version {
                    return Err(StoreError::ConcurrencyConflict {
                        entity: "product",
                        id: id.as_uuid(),
                        expected: expected.product_version,
                        actual: stored.version(),
                    });
                }
                for (variant_id, version) in &expected.variant_versions {
                    let actual = stored.variant(*variant_id).map_or(0, |v| v.version());
                    if actual != *version {
                        return Err(StoreError::ConcurrencyConflict {
                            entity: "variant",
                            id: variant_id.as_uuid(),
                            expected: *version,
                            actual,
                        });
                    }
                }
            }
            (None, None) => {}
        }

        for other in self.products.values().filter(|p| p.id() != id) {
            if !product.is_deleted() && !other.is_deleted() && other.slug() == product.slug() {
                return Err(StoreError::DuplicateKey {
                    entity: "product slug",
                    key: product.slug().to_string(),
                });
            }
            for variant in product.variants() {
                if other.variant_by_sku(variant.sku().as_str()).is_some() {
                    return Err(StoreError::DuplicateKey {
                        entity: "sku",
                        key: variant.sku().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_stock_write(&self, write: &StockWrite) -> Result<(), StoreError> {
        let variant_id = write.variant.id();
        let actual = self
            .products
            .get(&write.product_id)
            .and_then(|p| p.variant(variant_id))
            .map(|v| v.version())
            .ok_or(StoreError::Missing {
                entity: "variant",
                id: variant_id.as_uuid(),
            })?;

        if actual != write.expected_version {
            return Err(StoreError::ConcurrencyConflict {
                entity: "variant",
                id: variant_id.as_uuid(),
                expected: write.expected_version,
                actual,
            });
        }
        Ok(())
    }

    fn check_variation_type_write(&self, write: &VariationTypeWrite) -> Result<(), StoreError> {
        let vt = &write.variation_type;
        let exists = self.variation_types.contains_key(&vt.id());
        if write.is_new && exists {
            return Err(StoreError::DuplicateKey {
                entity: "variation type",
                key: vt.id().to_string(),
            });
        }
        if !write.is_new && !exists {
            return Err(StoreError::Missing {
                entity: "variation type",
                id: vt.id().as_uuid(),
            });
        }
        if self
            .variation_types
            .values()
            .any(|other| other.id() != vt.id() && other.name() == vt.name())
        {
            return Err(StoreError::DuplicateKey {
                entity: "variation type",
                key: vt.name().to_string(),
            });
        }
        Ok(())
    }

    fn check_order_write(&self, write: &OrderWrite) -> Result<(), StoreError> {
        let id = write.order.id();
        match (write.expected_version, self.orders.get(&id)) {
            (None, Some(_)) => Err(StoreError::DuplicateKey {
                entity: "order",
                key: id.to_string(),
            }),
            (Some(_), None) => Err(StoreError::Missing {
                entity: "order",
                id: id.as_uuid(),
            }),
            (Some(expected), Some(stored)) if stored.version() != expected => {
                Err(StoreError::ConcurrencyConflict {
                    entity: "order",
                    id: id.as_uuid(),
                    expected,
                    actual: stored.version(),
                })
            }
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Commit application (infallible once checked)
    // ------------------------------------------------------------------------

    fn apply_batch(&mut self, batch: WriteBatch) {
        for write in batch.products {
            let mut product = write.product;
            let next = write
                .expected
                .map_or(1, |expected| expected.product_version + 1);
            product.set_version(next);

            if let Some(previous) = self.products.get(&product.id()) {
                for variant in previous.variants() {
                    self.variant_index.remove(&variant.id());
                }
            }
            for variant in product.variants() {
                self.variant_index.insert(variant.id(), product.id());
            }
            self.products.insert(product.id(), product);
        }

        for write in batch.stock {
            if let Some(product) = self.products.get_mut(&write.product_id) {
                product.replace_variant(write.variant);
            }
        }

        for write in batch.variation_types {
            let vt = write.variation_type;
            self.variation_types.insert(vt.id(), vt);
        }

        for write in batch.orders {
            self.orders.insert(write.order.id(), write.order);
        }

        for mut message in batch.outbox {
            let position = self
                .stream_positions
                .entry(message.aggregate_id)
                .or_insert(0);
            *position += 1;
            message.sequence_number = *position;
            self.outbox.push(message);
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.ensure_available()?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        state.check_batch(&batch)?;
        state.apply_batch(batch);
        Ok(())
    }
}

#[async_trait]
impl CategoryLookup for InMemoryStore {
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().await.categories.get(&id).cloned())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().await.live_product(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect();
        products.sort_by_key(|p| p.created_at());
        Ok(products)
    }

    async fn find_products_by_variant_ids(
        &self,
        variant_ids: &[VariantId],
    ) -> Result<Vec<Product>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;

        let mut product_ids: Vec<ProductId> = variant_ids
            .iter()
            .filter_map(|v| state.variant_index.get(v).copied())
            .collect();
        product_ids.sort();
        product_ids.dedup();

        Ok(product_ids
            .iter()
            .filter_map(|id| state.live_product(id).cloned())
            .collect())
    }

    async fn sku_exists(&self, sku: &Sku) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .any(|p| p.variant_by_sku(sku.as_str()).is_some()))
    }

    async fn slug_exists(
        &self,
        slug: &str,
        excluding: Option<ProductId>,
    ) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| !p.is_deleted() && Some(p.id()) != excluding)
            .any(|p| p.slug() == slug))
    }

    async fn get_variation_type(
        &self,
        id: VariationTypeId,
    ) -> Result<Option<VariationType>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().await.variation_types.get(&id).cloned())
    }

    async fn find_variation_types(
        &self,
        ids: &[VariationTypeId],
    ) -> Result<Vec<VariationType>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.variation_types.get(id).cloned())
            .collect())
    }

    async fn variation_type_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.variation_types.values().any(|vt| vt.name() == name))
    }

    async fn option_in_use(&self, option_id: VariantOptionId) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.products.values().any(|p| p.selects_option(option_id)))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_purchaser(
        &self,
        purchaser_id: PurchaserId,
    ) -> Result<Vec<Order>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.purchaser_id() == purchaser_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|m| !m.is_published())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let now = Utc::now();
        for message in state.outbox.iter_mut().filter(|m| ids.contains(&m.id)) {
            message.published_at = Some(now);
        }
        Ok(())
    }

    async fn record_failed_attempt(&self, id: Uuid) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if let Some(message) = state.outbox.iter_mut().find(|m| m.id == id) {
            message.attempts += 1;
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{NewProduct, VariantInput};
    use rust_decimal_macros::dec;

    fn product(name: &str, sku: &str) -> Product {
        let (product, _) = Product::create(NewProduct {
            name: name.into(),
            description: None,
            base_price: dec!(5.00),
            category_id: CategoryId::new(),
            variation_types: vec![],
            variants: vec![VariantInput::new(sku, "Default").with_stock(3)],
            images: vec![],
        })
        .unwrap();
        product
    }

    async fn saved(store: &InMemoryStore, p: Product) -> Product {
        let id = p.id();
        let mut tx = Transaction::begin(store);
        tx.stage_new_product(p);
        tx.commit().await.unwrap();
        store.get_product(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_new_product_gets_version_one() {
        let store = InMemoryStore::new();
        let p = saved(&store, product("Mug", "MUG")).await;
        assert_eq!(p.version(), 1);
        assert!(store.sku_exists(&Sku::parse("mug", "sku").unwrap()).await.unwrap());
        assert!(store.slug_exists("mug", None).await.unwrap());
        assert!(!store.slug_exists("mug", Some(p.id())).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_product_write_is_rejected() {
        let store = InMemoryStore::new();
        let p = saved(&store, product("Mug", "MUG")).await;
        let snapshot = p.concurrency_snapshot();

        let mut first = p.clone();
        first.update_details("Big Mug", None).unwrap();
        let mut tx = Transaction::begin(&store);
        tx.stage_product(first, snapshot.clone());
        tx.commit().await.unwrap();

        let mut second = p.clone();
        second.update_details("Small Mug", None).unwrap();
        let mut tx = Transaction::begin(&store);
        tx.stage_product(second, snapshot);
        let err = tx.commit().await.unwrap_err();

        assert!(err.is_concurrency_conflict());
        assert_eq!(store.get_product(p.id()).await.unwrap().unwrap().name(), "Big Mug");
    }

    #[tokio::test]
    async fn test_stock_write_checks_variant_version() {
        let store = InMemoryStore::new();
        let p = saved(&store, product("Mug", "MUG")).await;
        let variant_id = p.variants()[0].id();
        let read_version = p.variants()[0].version();

        let mut copy = p.clone();
        copy.decrease_stock(variant_id, 1).unwrap();
        let updated = copy.variant(variant_id).unwrap().clone();

        let mut tx = Transaction::begin(&store);
        tx.stage_stock(p.id(), updated.clone(), read_version);
        tx.commit().await.unwrap();

        let mut tx = Transaction::begin(&store);
        tx.stage_stock(p.id(), updated, read_version);
        assert!(tx.commit().await.unwrap_err().is_concurrency_conflict());

        let stored = store.get_product(p.id()).await.unwrap().unwrap();
        assert_eq!(stored.variant(variant_id).unwrap().stock_quantity(), 2);
    }

    #[tokio::test]
    async fn test_rejected_batch_applies_nothing() {
        let store = InMemoryStore::new();
        saved(&store, product("Mug", "MUG")).await;

        let mut tx = Transaction::begin(&store);
        tx.stage_new_product(product("Plate", "PLATE"));
        tx.stage_new_product(product("Other Mug", "mug"));
        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateKey { entity: "sku", .. }));
        assert_eq!(store.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_rejects_keys_shared_between_its_own_writes() {
        let store = InMemoryStore::new();

        let mut tx = Transaction::begin(&store);
        tx.stage_new_product(product("Plate", "DISH-1"));
        tx.stage_new_product(product("Bowl", "dish-1"));
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { entity: "sku", .. }));

        let mut tx = Transaction::begin(&store);
        tx.stage_new_product(product("Plate", "PLATE-1"));
        tx.stage_new_product(product("plate", "PLATE-2"));
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { entity: "product slug", .. }));

        assert!(store.list_products().await.unwrap().is_empty());
        assert_eq!(store.outbox_len().await, 0);
    }

    #[tokio::test]
    async fn test_deleted_products_are_hidden() {
        let store = InMemoryStore::new();
        let p = saved(&store, product("Mug", "MUG")).await;
        let variant_id = p.variants()[0].id();

        let snapshot = p.concurrency_snapshot();
        let mut deleted = p.clone();
        deleted.delete().unwrap();
        let mut tx = Transaction::begin(&store);
        tx.stage_product(deleted, snapshot);
        tx.commit().await.unwrap();

        assert!(store.get_product(p.id()).await.unwrap().is_none());
        assert!(store
            .find_products_by_variant_ids(&[variant_id])
            .await
            .unwrap()
            .is_empty());
        assert!(!store.slug_exists("mug", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_orders().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.list_orders().await.unwrap().is_empty());
    }
}
