use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::ids::{CategoryId, ProductId, VariantOptionId, VariationTypeId};
use crate::errors::AppError;
use crate::event_sourcing::core::Aggregate;
use crate::store::{CatalogRepository, CategoryLookup, Transaction, UnitOfWork};

use super::commands::ProductCommand;
use super::errors::CatalogError;
use super::events::ProductEvent;
use super::product::{NewProduct, Product};
use super::value_objects::{Category, ImageInput, Sku};
use super::variant::VariantInput;
use super::variation_type::{OptionKey, VariationType};

// ============================================================================
// Catalog Command Handler
// ============================================================================
//
// Orchestrates: load → check → mutate → stage aggregate + outbox → commit
//
// Global uniqueness (slug, SKU) is checked against the repository before
// staging and enforced again by the store at commit, so a racing writer
// still ends in Conflict rather than a duplicate.
//
// ============================================================================

/// Product creation request; variation types are referenced by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub category_id: CategoryId,
    pub variation_type_ids: Vec<VariationTypeId>,
    pub variants: Vec<VariantInput>,
    pub images: Vec<ImageInput>,
}

pub struct CatalogCommandHandler {
    catalog: Arc<dyn CatalogRepository>,
    categories: Arc<dyn CategoryLookup>,
    uow: Arc<dyn UnitOfWork>,
}

impl CatalogCommandHandler {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        categories: Arc<dyn CategoryLookup>,
        uow: Arc<dyn UnitOfWork>,
    ) -> Self {
        Self {
            catalog,
            categories,
            uow,
        }
    }

    // ------------------------------------------------------------------------
    // Variation types
    // ------------------------------------------------------------------------

    pub async fn create_variation_type(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<VariationTypeId, AppError> {
        let variation_type = VariationType::create(name, display_name)?;
        if self
            .catalog
            .variation_type_name_exists(variation_type.name())
            .await?
        {
            return Err(AppError::Conflict(format!(
                "variation type {} already exists",
                variation_type.name()
            )));
        }

        let id = variation_type.id();
        let mut tx = Transaction::begin(self.uow.as_ref());
        tx.stage_variation_type(variation_type, true);
        tx.commit().await?;

        tracing::info!(variation_type_id = %id, name = name, "Variation type created");
        Ok(id)
    }

    pub async fn add_option(
        &self,
        variation_type_id: VariationTypeId,
        value: &str,
        display_value: &str,
        sort_order: u32,
    ) -> Result<VariantOptionId, AppError> {
        let mut variation_type = self.load_variation_type(variation_type_id).await?;
        let option_id = variation_type.add_option(value, display_value, sort_order)?;
        self.save_variation_type(variation_type).await?;
        Ok(option_id)
    }

    pub async fn update_option(
        &self,
        variation_type_id: VariationTypeId,
        key: &OptionKey,
        value: &str,
        display_value: &str,
        sort_order: u32,
    ) -> Result<(), AppError> {
        let mut variation_type = self.load_variation_type(variation_type_id).await?;
        variation_type.update_option(key, value, display_value, sort_order)?;
        self.save_variation_type(variation_type).await
    }

    /// Rejected while any variant of any product selects the option
    pub async fn remove_option(
        &self,
        variation_type_id: VariationTypeId,
        key: &OptionKey,
    ) -> Result<(), AppError> {
        let mut variation_type = self.load_variation_type(variation_type_id).await?;
        let option_id = variation_type
            .find_option(key)
            .map(|o| o.id())
            .ok_or_else(|| CatalogError::OptionNotFound(key.to_string()))?;
        let in_use = self.catalog.option_in_use(option_id).await?;

        variation_type.remove_option(key, |_| in_use)?;
        self.save_variation_type(variation_type).await
    }

    pub async fn update_variation_type_display_name(
        &self,
        variation_type_id: VariationTypeId,
        display_name: &str,
    ) -> Result<(), AppError> {
        let mut variation_type = self.load_variation_type(variation_type_id).await?;
        variation_type.update_display_name(display_name)?;
        self.save_variation_type(variation_type).await
    }

    /// Inactive types stay on existing products but cannot be applied to new ones
    pub async fn set_variation_type_active(
        &self,
        variation_type_id: VariationTypeId,
        active: bool,
    ) -> Result<(), AppError> {
        let mut variation_type = self.load_variation_type(variation_type_id).await?;
        if active {
            variation_type.activate();
        } else {
            variation_type.deactivate();
        }
        self.save_variation_type(variation_type).await
    }

    // ------------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------------

    pub async fn create_product(
        &self,
        request: CreateProduct,
        correlation_id: Uuid,
    ) -> Result<ProductId, AppError> {
        let category = self.load_category(request.category_id).await?;
        if !category.is_active {
            return Err(CatalogError::CategoryInactive(category.id).into());
        }
        let variation_types = self.load_variation_types(&request.variation_type_ids).await?;

        let (product, created) = Product::create(NewProduct {
            name: request.name,
            description: request.description,
            base_price: request.base_price,
            category_id: request.category_id,
            variation_types,
            variants: request.variants,
            images: request.images,
        })?;

        if self.catalog.slug_exists(product.slug(), None).await? {
            return Err(CatalogError::SlugTaken(product.slug().to_string()).into());
        }
        for variant in product.variants() {
            self.ensure_sku_free(variant.sku()).await?;
        }

        let product_id = product.id();
        let envelopes = product.envelope_events(vec![created], correlation_id);

        let mut tx = Transaction::begin(self.uow.as_ref());
        tx.stage_new_product(product);
        tx.stage_events(&envelopes)?;
        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            correlation_id = %correlation_id,
            "Product created"
        );
        Ok(product_id)
    }

    /// Apply one command to a stored product and commit it with its event
    pub async fn handle(
        &self,
        product_id: ProductId,
        command: ProductCommand,
        correlation_id: Uuid,
    ) -> Result<ProductEvent, AppError> {
        let mut product = self.load_product(product_id).await?;
        let expected = product.concurrency_snapshot();
        let command_name = command.name();

        let event = match command {
            ProductCommand::UpdateDetails { name, description } => {
                let event = product.update_details(&name, description)?;
                if self
                    .catalog
                    .slug_exists(product.slug(), Some(product_id))
                    .await?
                {
                    return Err(CatalogError::SlugTaken(product.slug().to_string()).into());
                }
                event
            }
            ProductCommand::UpdateBasePrice { price } => product.update_base_price(price)?,
            ProductCommand::ChangeCategory { category_id } => {
                let category = self.load_category(category_id).await?;
                product.change_category(&category)?
            }
            ProductCommand::Activate => product.activate()?,
            ProductCommand::Deactivate => product.deactivate()?,
            ProductCommand::AddVariationType {
                variation_type_id,
                assignments,
            } => {
                let variation_type = self.load_variation_type(variation_type_id).await?;
                product.add_variation_type(&variation_type, &assignments)?
            }
            ProductCommand::RemoveVariationType { variation_type_id } => {
                product.remove_variation_type(variation_type_id)?
            }
            ProductCommand::AddImage { image } => product.add_image(image)?,
            ProductCommand::RemoveImage { image_id } => product.remove_image(image_id)?,
            ProductCommand::SetMainImage { image_id } => product.set_main_image(image_id)?,
            ProductCommand::AddVariant { variant } => {
                let types = self
                    .load_variation_types(product.variation_type_ids())
                    .await?;
                let (variant_id, event) = product.add_variant(&variant, &types)?;
                if let Some(added) = product.variant(variant_id) {
                    self.ensure_sku_free(added.sku()).await?;
                }
                event
            }
            ProductCommand::RemoveVariant { variant_id } => product.remove_variant(variant_id)?,
            ProductCommand::UpdateVariantStock {
                variant_id,
                quantity,
            } => product.update_variant_stock(variant_id, quantity)?,
            ProductCommand::UpdateVariantPrice { variant_id, price } => {
                product.update_variant_price(variant_id, price)?
            }
            ProductCommand::UpdateVariantDetails {
                variant_id,
                name,
                old_price,
            } => product.update_variant_details(variant_id, &name, old_price)?,
            ProductCommand::SetVariantActive { variant_id, active } => {
                product.set_variant_active(variant_id, active)?
            }
            ProductCommand::SetVariantInventoryTracking {
                variant_id,
                enabled,
            } => product.set_variant_track_inventory(variant_id, enabled)?,
            ProductCommand::SetVariantMinStock {
                variant_id,
                min_stock,
            } => product.set_variant_min_stock(variant_id, min_stock)?,
            ProductCommand::Delete => product.delete()?,
        };

        let envelopes: Vec<_> = product
            .envelope_events(vec![event.clone()], correlation_id)
            .into_iter()
            .map(|e| e.with_metadata("command", command_name))
            .collect();
        let mut tx = Transaction::begin(self.uow.as_ref());
        tx.stage_product(product, expected);
        tx.stage_events(&envelopes)?;
        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            command = command_name,
            correlation_id = %correlation_id,
            "Product command applied"
        );
        Ok(event)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, AppError> {
        self.load_product(product_id).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.catalog.list_products().await?)
    }

    pub async fn get_variation_type(
        &self,
        variation_type_id: VariationTypeId,
    ) -> Result<VariationType, AppError> {
        self.load_variation_type(variation_type_id).await
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn load_product(&self, product_id: ProductId) -> Result<Product, AppError> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("product", product_id))
    }

    async fn load_category(&self, category_id: CategoryId) -> Result<Category, AppError> {
        self.categories
            .get_category(category_id)
            .await?
            .ok_or_else(|| AppError::not_found("category", category_id))
    }

    async fn load_variation_type(
        &self,
        variation_type_id: VariationTypeId,
    ) -> Result<VariationType, AppError> {
        self.catalog
            .get_variation_type(variation_type_id)
            .await?
            .ok_or_else(|| AppError::not_found("variation type", variation_type_id))
    }

    /// Every id must resolve; the result keeps the requested order
    async fn load_variation_types(
        &self,
        ids: &[VariationTypeId],
    ) -> Result<Vec<VariationType>, AppError> {
        let found = self.catalog.find_variation_types(ids).await?;
        ids.iter()
            .map(|id| {
                found
                    .iter()
                    .find(|vt| vt.id() == *id)
                    .cloned()
                    .ok_or_else(|| AppError::not_found("variation type", id))
            })
            .collect()
    }

    async fn save_variation_type(&self, variation_type: VariationType) -> Result<(), AppError> {
        let id = variation_type.id();
        let mut tx = Transaction::begin(self.uow.as_ref());
        tx.stage_variation_type(variation_type, false);
        tx.commit().await?;
        tracing::debug!(variation_type_id = %id, "Variation type saved");
        Ok(())
    }

    async fn ensure_sku_free(&self, sku: &Sku) -> Result<(), AppError> {
        if self.catalog.sku_exists(sku).await? {
            return Err(CatalogError::SkuTaken(sku.to_string()).into());
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
