use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::ids::{CategoryId, ImageId, ProductId, VariantId, VariantOptionId, VariationTypeId};
use crate::errors::FieldError;
use crate::event_sourcing::core::Aggregate;

use super::combination::{validate_selection, CombinationError};
use super::errors::CatalogError;
use super::events::*;
use super::value_objects::{
    check_optional, check_price, check_required, slugify, Category, ImageInput, ProductImage, Sku,
    MAX_DESCRIPTION_LEN, MAX_PRODUCT_NAME_LEN,
};
use super::variant::{ProductVariant, VariantInput};
use super::variation_type::VariationType;

// ============================================================================
// Product Aggregate
// ============================================================================
//
// Invariants held after every successful operation:
// 1. At least one variant exists
// 2. Each variant selects exactly one option per applied variation type
// 3. Each selected option belongs to the type it is keyed under
// 4. SKUs are unique within the product (case-insensitive)
// 5. At most one image is flagged main
//
// Operations validate everything before touching state, so a failed call
// leaves the aggregate unchanged. Each success returns the events it produced.
//
// ============================================================================

/// Everything needed to construct a product in one step
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub category_id: CategoryId,
    pub variation_types: Vec<VariationType>,
    pub variants: Vec<VariantInput>,
    pub images: Vec<ImageInput>,
}

/// Concurrency tokens captured when a product was loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSnapshot {
    pub product_version: u64,
    pub variant_versions: Vec<(VariantId, u64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    slug: String,
    description: Option<String>,
    category_id: CategoryId,
    base_price: Decimal,
    is_active: bool,
    is_deleted: bool,
    images: Vec<ProductImage>,
    variation_type_ids: Vec<VariationTypeId>,
    variants: Vec<ProductVariant>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    pub fn create(input: NewProduct) -> Result<(Self, ProductEvent), CatalogError> {
        // 1. Scalar fields
        let mut errors = Vec::new();
        check_required(&mut errors, "name", &input.name, MAX_PRODUCT_NAME_LEN);
        check_optional(
            &mut errors,
            "description",
            input.description.as_deref(),
            MAX_DESCRIPTION_LEN,
        );
        check_price(&mut errors, "base_price", input.base_price);
        let slug = slugify(&input.name);
        if errors.is_empty() && slug.is_empty() {
            errors.push(FieldError::new("name", "must contain at least one letter or digit"));
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        // 2. At least one variant
        if input.variants.is_empty() {
            return Err(CatalogError::invalid(
                "variants",
                "at least one variant is required",
            ));
        }

        // 3. Images
        Self::check_images(&input.images)?;

        // 4. Variation types: all active, none repeated
        for (idx, vt) in input.variation_types.iter().enumerate() {
            if input.variation_types[..idx].iter().any(|v| v.id() == vt.id()) {
                return Err(CatalogError::DuplicateVariationType(vt.id()));
            }
            if !vt.is_active() {
                return Err(CatalogError::InactiveVariationType(vt.name().to_string()));
            }
        }

        // 5. SKUs: well-formed, then pairwise distinct
        let skus = Self::parse_skus(&input.variants)?;
        let duplicates = Self::duplicate_skus(&skus);
        if !duplicates.is_empty() {
            return Err(CatalogError::DuplicateSku(duplicates));
        }

        // 6. Each variant against the attached types
        let id = ProductId::new();
        let mut errors = Vec::new();
        let mut variants = Vec::with_capacity(input.variants.len());
        for (idx, (variant_input, sku)) in input.variants.iter().zip(skus).enumerate() {
            let prefix = format!("variants[{idx}]");
            errors.extend(variant_input.check_fields(&prefix));

            match validate_selection(&input.variation_types, &variant_input.options) {
                Ok(selection) => {
                    variants.push(ProductVariant::create(id, sku, variant_input, selection))
                }
                Err(problems) => errors.extend(problems.into_iter().map(|p| {
                    FieldError::new(format!("{prefix}.options"), format!("{}: {}", sku, p))
                })),
            }
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        // 7. Only now does the aggregate exist
        let now = Utc::now();
        let product = Self {
            id,
            name: input.name.trim().to_string(),
            slug,
            description: input.description.map(|d| d.trim().to_string()),
            category_id: input.category_id,
            base_price: input.base_price,
            is_active: true,
            is_deleted: false,
            images: Self::build_images(input.images),
            variation_type_ids: input.variation_types.iter().map(VariationType::id).collect(),
            variants,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let event = ProductEvent::Created(ProductCreated {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            category_id: product.category_id,
            base_price: product.base_price,
            variant_skus: product.variants.iter().map(|v| v.sku().to_string()).collect(),
        });

        Ok((product, event))
    }

    fn check_images(images: &[ImageInput]) -> Result<(), CatalogError> {
        let mut errors = Vec::new();
        for (idx, image) in images.iter().enumerate() {
            if image.url.trim().is_empty() {
                errors.push(FieldError::new(format!("images[{idx}].url"), "is required"));
            }
        }
        if images.iter().filter(|i| i.is_main).count() > 1 {
            errors.push(FieldError::new(
                "images",
                "at most one image can be marked as main",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(errors))
        }
    }

    fn build_images(images: Vec<ImageInput>) -> Vec<ProductImage> {
        images
            .into_iter()
            .enumerate()
            .map(|(idx, image)| ProductImage {
                id: ImageId::new(),
                url: image.url.trim().to_string(),
                alt_text: image.alt_text,
                is_main: image.is_main,
                sort_order: idx as u32,
            })
            .collect()
    }

    fn parse_skus(inputs: &[VariantInput]) -> Result<Vec<Sku>, CatalogError> {
        let mut errors = Vec::new();
        let mut skus = Vec::with_capacity(inputs.len());
        for (idx, input) in inputs.iter().enumerate() {
            match Sku::parse(&input.sku, &format!("variants[{idx}].sku")) {
                Ok(sku) => skus.push(sku),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(skus)
        } else {
            Err(CatalogError::Validation(errors))
        }
    }

    /// Every SKU that appears more than once, each reported once
    fn duplicate_skus(skus: &[Sku]) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for sku in skus {
            *counts.entry(sku.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(sku, _)| sku.to_string())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn base_price(&self) -> Decimal {
        self.base_price
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Active and not deleted
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    pub fn images(&self) -> &[ProductImage] {
        &self.images
    }

    /// The flagged image, or the first one when none is flagged
    pub fn main_image(&self) -> Option<&ProductImage> {
        self.images
            .iter()
            .find(|i| i.is_main)
            .or_else(|| self.images.first())
    }

    pub fn variation_type_ids(&self) -> &[VariationTypeId] {
        &self.variation_type_ids
    }

    pub fn variants(&self) -> &[ProductVariant] {
        &self.variants
    }

    pub fn variant(&self, variant_id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id() == variant_id)
    }

    pub fn variant_by_sku(&self, sku: &str) -> Option<&ProductVariant> {
        let sku = sku.trim().to_uppercase();
        self.variants.iter().find(|v| v.sku().as_str() == sku)
    }

    pub fn effective_price(&self, variant_id: VariantId) -> Option<Decimal> {
        self.variant(variant_id)
            .map(|v| v.effective_price(self.base_price))
    }

    pub fn selects_option(&self, option_id: VariantOptionId) -> bool {
        self.variants
            .iter()
            .any(|v| v.options().option_ids().any(|o| o == option_id))
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn concurrency_snapshot(&self) -> VersionSnapshot {
        VersionSnapshot {
            product_version: self.version,
            variant_versions: self.variants.iter().map(|v| (v.id(), v.version())).collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Product-level mutations
    // ------------------------------------------------------------------------

    pub fn update_details(
        &mut self,
        name: &str,
        description: Option<String>,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let mut errors = Vec::new();
        check_required(&mut errors, "name", name, MAX_PRODUCT_NAME_LEN);
        check_optional(&mut errors, "description", description.as_deref(), MAX_DESCRIPTION_LEN);
        let slug = slugify(name);
        if errors.is_empty() && slug.is_empty() {
            errors.push(FieldError::new("name", "must contain at least one letter or digit"));
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        self.name = name.trim().to_string();
        self.slug = slug;
        self.description = description.map(|d| d.trim().to_string());
        Ok(self.updated(ProductChange::Details))
    }

    pub fn update_base_price(&mut self, price: Decimal) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let mut errors = Vec::new();
        check_price(&mut errors, "base_price", price);
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let old = self.base_price;
        self.base_price = price;
        self.invalidate_variant_reads();
        self.touch();
        Ok(ProductEvent::PriceChanged(ProductPriceChanged {
            product_id: self.id,
            variant_id: None,
            old_price: Some(old),
            new_price: Some(price),
        }))
    }

    pub fn change_category(&mut self, category: &Category) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        if !category.is_active {
            return Err(CatalogError::CategoryInactive(category.id));
        }
        self.category_id = category.id;
        Ok(self.updated(ProductChange::Category {
            category_id: category.id,
        }))
    }

    pub fn activate(&mut self) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.is_active = true;
        self.invalidate_variant_reads();
        Ok(self.updated(ProductChange::Activated))
    }

    pub fn deactivate(&mut self) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.is_active = false;
        self.invalidate_variant_reads();
        Ok(self.updated(ProductChange::Deactivated))
    }

    /// Effective price and availability come from the product too, so a
    /// placement that read them before this edit must fail its stock write
    fn invalidate_variant_reads(&mut self) {
        for variant in &mut self.variants {
            variant.invalidate_reads();
        }
    }

    /// Soft delete; every variant is deactivated with the product
    pub fn delete(&mut self) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.is_deleted = true;
        self.is_active = false;
        for variant in &mut self.variants {
            variant.set_active(false);
        }
        self.touch();
        Ok(ProductEvent::Deleted(ProductDeleted { product_id: self.id }))
    }

    // ------------------------------------------------------------------------
    // Variation types
    // ------------------------------------------------------------------------

    /// Apply a new axis. Every existing variant must be given an option of
    /// the new type in `assignments`, otherwise nothing changes.
    pub fn add_variation_type(
        &mut self,
        variation_type: &VariationType,
        assignments: &[(VariantId, VariantOptionId)],
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let type_id = variation_type.id();
        if !variation_type.is_active() {
            return Err(CatalogError::InactiveVariationType(
                variation_type.name().to_string(),
            ));
        }
        if self.variation_type_ids.contains(&type_id) {
            return Err(CatalogError::VariationTypeAlreadyApplied(type_id));
        }

        for (idx, (variant_id, _)) in assignments.iter().enumerate() {
            if self.variant(*variant_id).is_none() {
                return Err(CatalogError::VariantNotFound(*variant_id));
            }
            if assignments[..idx].iter().any(|(v, _)| v == variant_id) {
                return Err(CatalogError::invalid(
                    "assignments",
                    format!("variant {} is assigned more than once", variant_id),
                ));
            }
        }

        for variant in &self.variants {
            let problem = match assignments.iter().find(|(v, _)| *v == variant.id()) {
                None => Some(CombinationError::MissingType {
                    type_id,
                    type_name: variation_type.name().to_string(),
                }),
                Some((_, option_id)) if !variation_type.has_option(*option_id) => {
                    Some(CombinationError::InvalidOption {
                        type_id,
                        type_name: variation_type.name().to_string(),
                        option_id: *option_id,
                    })
                }
                Some(_) => None,
            };
            if let Some(problem) = problem {
                return Err(CatalogError::InvalidCombination {
                    sku: variant.sku().to_string(),
                    errors: vec![problem],
                });
            }
        }

        for (variant_id, option_id) in assignments {
            if let Some(variant) = self.variants.iter_mut().find(|v| v.id() == *variant_id) {
                variant.extend_options(type_id, *option_id)?;
            }
        }
        self.variation_type_ids.push(type_id);
        Ok(self.updated(ProductChange::VariationTypeAdded {
            variation_type_id: type_id,
        }))
    }

    /// Rejected while any variant exists: their selections would be orphaned
    pub fn remove_variation_type(
        &mut self,
        variation_type_id: VariationTypeId,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        if !self.variation_type_ids.contains(&variation_type_id) {
            return Err(CatalogError::VariationTypeNotApplied(variation_type_id));
        }
        if !self.variants.is_empty() {
            return Err(CatalogError::VariationTypeLocked(variation_type_id));
        }

        self.variation_type_ids.retain(|id| *id != variation_type_id);
        Ok(self.updated(ProductChange::VariationTypeRemoved {
            variation_type_id,
        }))
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    pub fn add_image(&mut self, image: ImageInput) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        if image.url.trim().is_empty() {
            return Err(CatalogError::invalid("url", "is required"));
        }

        if image.is_main {
            for existing in &mut self.images {
                existing.is_main = false;
            }
        }
        let image = ProductImage {
            id: ImageId::new(),
            url: image.url.trim().to_string(),
            alt_text: image.alt_text,
            is_main: image.is_main,
            sort_order: self.images.iter().map(|i| i.sort_order + 1).max().unwrap_or(0),
        };
        let image_id = image.id;
        self.images.push(image);
        Ok(self.updated(ProductChange::ImageAdded { image_id }))
    }

    pub fn remove_image(&mut self, image_id: ImageId) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let idx = self
            .images
            .iter()
            .position(|i| i.id == image_id)
            .ok_or(CatalogError::ImageNotFound(image_id))?;
        self.images.remove(idx);
        Ok(self.updated(ProductChange::ImageRemoved { image_id }))
    }

    pub fn set_main_image(&mut self, image_id: ImageId) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        if !self.images.iter().any(|i| i.id == image_id) {
            return Err(CatalogError::ImageNotFound(image_id));
        }
        for image in &mut self.images {
            image.is_main = image.id == image_id;
        }
        Ok(self.updated(ProductChange::MainImageChanged { image_id }))
    }

    // ------------------------------------------------------------------------
    // Variants
    // ------------------------------------------------------------------------

    /// `types` must contain the definitions of every applied variation type;
    /// extra definitions are ignored.
    pub fn add_variant(
        &mut self,
        input: &VariantInput,
        types: &[VariationType],
    ) -> Result<(VariantId, ProductEvent), CatalogError> {
        self.ensure_not_deleted()?;
        let sku = Sku::parse(&input.sku, "sku").map_err(|e| CatalogError::Validation(vec![e]))?;
        if self.variants.iter().any(|v| v.sku() == &sku) {
            return Err(CatalogError::DuplicateSku(vec![sku.to_string()]));
        }

        let errors = input.check_fields("variant");
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let mut required = Vec::with_capacity(self.variation_type_ids.len());
        for type_id in &self.variation_type_ids {
            match types.iter().find(|vt| vt.id() == *type_id) {
                Some(vt) => required.push(vt.clone()),
                None => {
                    return Err(CatalogError::invalid(
                        "variation_types",
                        format!("definition for variation type {} was not supplied", type_id),
                    ))
                }
            }
        }

        let selection = validate_selection(&required, &input.options).map_err(|errors| {
            CatalogError::InvalidCombination {
                sku: sku.to_string(),
                errors,
            }
        })?;

        let variant = ProductVariant::create(self.id, sku.clone(), input, selection);
        let variant_id = variant.id();
        self.variants.push(variant);
        let event = self.updated(ProductChange::VariantAdded {
            variant_id,
            sku: sku.to_string(),
        });
        Ok((variant_id, event))
    }

    pub fn remove_variant(&mut self, variant_id: VariantId) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let idx = self
            .variants
            .iter()
            .position(|v| v.id() == variant_id)
            .ok_or(CatalogError::VariantNotFound(variant_id))?;
        if self.variants.len() == 1 {
            return Err(CatalogError::LastVariant);
        }

        let removed = self.variants.remove(idx);
        Ok(self.updated(ProductChange::VariantRemoved {
            variant_id,
            sku: removed.sku().to_string(),
        }))
    }

    pub fn update_variant_stock(
        &mut self,
        variant_id: VariantId,
        quantity: i64,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let product_id = self.id;
        let variant = self.variant_mut(variant_id)?;
        let old_quantity = variant.update_stock(quantity)?;
        let event = ProductEvent::StockChanged(VariantStockChanged {
            product_id,
            variant_id,
            sku: variant.sku().to_string(),
            old_quantity,
            new_quantity: variant.stock_quantity(),
            reason: StockChangeReason::Adjusted,
        });
        self.touch();
        Ok(event)
    }

    /// Stock decrement for order placement only
    pub(crate) fn decrease_stock(
        &mut self,
        variant_id: VariantId,
        amount: u32,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let product_id = self.id;
        let variant = self.variant_mut(variant_id)?;
        let old_quantity = variant.decrease_stock(amount)?;
        let event = ProductEvent::StockChanged(VariantStockChanged {
            product_id,
            variant_id,
            sku: variant.sku().to_string(),
            old_quantity,
            new_quantity: variant.stock_quantity(),
            reason: StockChangeReason::OrderPlaced,
        });
        self.touch();
        Ok(event)
    }

    pub fn update_variant_price(
        &mut self,
        variant_id: VariantId,
        price: Option<Decimal>,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        let product_id = self.id;
        let old_price = self.variant_mut(variant_id)?.update_price(price)?;
        self.touch();
        Ok(ProductEvent::PriceChanged(ProductPriceChanged {
            product_id,
            variant_id: Some(variant_id),
            old_price,
            new_price: price,
        }))
    }

    pub fn update_variant_details(
        &mut self,
        variant_id: VariantId,
        name: &str,
        old_price: Option<Decimal>,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.variant_mut(variant_id)?.update_details(name, old_price)?;
        Ok(self.updated(ProductChange::VariantDetails { variant_id }))
    }

    pub fn set_variant_active(
        &mut self,
        variant_id: VariantId,
        active: bool,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.variant_mut(variant_id)?.set_active(active);
        let change = if active {
            ProductChange::VariantActivated { variant_id }
        } else {
            ProductChange::VariantDeactivated { variant_id }
        };
        Ok(self.updated(change))
    }

    pub fn set_variant_track_inventory(
        &mut self,
        variant_id: VariantId,
        enabled: bool,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.variant_mut(variant_id)?.set_track_inventory(enabled);
        Ok(self.updated(ProductChange::VariantInventoryTracking {
            variant_id,
            enabled,
        }))
    }

    pub fn set_variant_min_stock(
        &mut self,
        variant_id: VariantId,
        min_stock: u32,
    ) -> Result<ProductEvent, CatalogError> {
        self.ensure_not_deleted()?;
        self.variant_mut(variant_id)?.set_min_stock(min_stock);
        Ok(self.updated(ProductChange::VariantMinStock {
            variant_id,
            min_stock,
        }))
    }

    // ------------------------------------------------------------------------
    // Persistence hooks (store only)
    // ------------------------------------------------------------------------

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Swap in a stock-updated copy of one variant
    pub(crate) fn replace_variant(&mut self, variant: ProductVariant) -> bool {
        match self.variants.iter_mut().find(|v| v.id() == variant.id()) {
            Some(slot) => {
                *slot = variant;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn variant_mut(&mut self, variant_id: VariantId) -> Result<&mut ProductVariant, CatalogError> {
        self.variants
            .iter_mut()
            .find(|v| v.id() == variant_id)
            .ok_or(CatalogError::VariantNotFound(variant_id))
    }

    fn ensure_not_deleted(&self) -> Result<(), CatalogError> {
        if self.is_deleted {
            Err(CatalogError::ProductDeleted(self.id))
        } else {
            Ok(())
        }
    }

    fn updated(&mut self, change: ProductChange) -> ProductEvent {
        self.touch();
        ProductEvent::Updated(ProductUpdated {
            product_id: self.id,
            change,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Aggregate for Product {
    type Event = ProductEvent;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    struct Fixture {
        color: VariationType,
        red: VariantOptionId,
        blue: VariantOptionId,
        size: VariationType,
        small: VariantOptionId,
        large: VariantOptionId,
    }

    fn fixture() -> Fixture {
        let mut color = VariationType::create("Color", "Color").unwrap();
        let red = color.add_option("red", "Red", 0).unwrap();
        let blue = color.add_option("blue", "Blue", 1).unwrap();
        let mut size = VariationType::create("Size", "Size").unwrap();
        let small = size.add_option("s", "Small", 0).unwrap();
        let large = size.add_option("l", "Large", 1).unwrap();
        Fixture {
            color,
            red,
            blue,
            size,
            small,
            large,
        }
    }

    fn new_product(types: Vec<VariationType>, variants: Vec<VariantInput>) -> NewProduct {
        NewProduct {
            name: "Linen Shirt".into(),
            description: Some("Breathable".into()),
            base_price: dec!(10.00),
            category_id: CategoryId::new(),
            variation_types: types,
            variants,
            images: vec![],
        }
    }

    fn shirt(f: &Fixture) -> Product {
        let (product, _) = Product::create(new_product(
            vec![f.color.clone()],
            vec![
                VariantInput::new("A-RED", "Red").with_option(f.color.id(), f.red).with_stock(5),
                VariantInput::new("A-BLUE", "Blue").with_option(f.color.id(), f.blue).with_stock(2),
            ],
        ))
        .unwrap();
        product
    }

    #[test]
    fn test_scenario_a_two_color_variants() {
        let f = fixture();
        let (product, event) = Product::create(new_product(
            vec![f.color.clone()],
            vec![
                VariantInput::new("A-RED", "Red").with_option(f.color.id(), f.red),
                VariantInput::new("A-BLUE", "Blue").with_option(f.color.id(), f.blue),
            ],
        ))
        .unwrap();

        assert_eq!(product.variants().len(), 2);
        assert_eq!(product.slug(), "linen-shirt");
        for variant in product.variants() {
            assert_eq!(product.effective_price(variant.id()), Some(dec!(10.00)));
        }
        match event {
            ProductEvent::Created(created) => {
                assert_eq!(created.product_id, product.id());
                assert_eq!(created.variant_skus, vec!["A-RED", "A-BLUE"]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_scenario_b_duplicate_sku_names_the_sku() {
        let f = fixture();
        let err = Product::create(new_product(
            vec![f.color.clone()],
            vec![
                VariantInput::new("A-RED", "Red").with_option(f.color.id(), f.red),
                VariantInput::new("a-red", "Blue").with_option(f.color.id(), f.blue),
            ],
        ))
        .unwrap_err();

        assert_eq!(err, CatalogError::DuplicateSku(vec!["A-RED".into()]));
        assert!(err.to_string().contains("A-RED"));
    }

    #[test]
    fn test_every_duplicate_sku_is_reported() {
        let err = Product::create(new_product(
            vec![],
            vec![
                VariantInput::new("X", "x"),
                VariantInput::new("Y", "y"),
                VariantInput::new("x", "x2"),
                VariantInput::new("y", "y2"),
            ],
        ))
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateSku(vec!["X".into(), "Y".into()]));
    }

    #[test]
    fn test_scenario_c_missing_size_option() {
        let f = fixture();
        let err = Product::create(new_product(
            vec![f.color.clone(), f.size.clone()],
            vec![VariantInput::new("A-RED", "Red").with_option(f.color.id(), f.red)],
        ))
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        match err {
            CatalogError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "variants[0].options");
                assert_eq!(fields[0].message, "A-RED: missing size option");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_variants_rejected() {
        let f = fixture();
        let err = Product::create(new_product(vec![f.color.clone()], vec![])).unwrap_err();
        assert!(err.to_string().contains("at least one variant"));
    }

    #[test]
    fn test_scalar_fields_validated_together() {
        let mut input = new_product(vec![], vec![VariantInput::new("S", "Simple")]);
        input.name = "".into();
        input.base_price = dec!(0);
        input.description = Some("d".repeat(MAX_DESCRIPTION_LEN + 1));

        match Product::create(input).unwrap_err() {
            CatalogError::Validation(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["name", "description", "base_price"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_inactive_variation_type_fails_whole_construction() {
        let mut f = fixture();
        f.size.deactivate();
        let err = Product::create(new_product(
            vec![f.color.clone(), f.size.clone()],
            vec![VariantInput::new("A", "a")
                .with_option(f.color.id(), f.red)
                .with_option(f.size.id(), f.small)],
        ))
        .unwrap_err();
        assert_eq!(err, CatalogError::InactiveVariationType("size".into()));
    }

    #[test]
    fn test_images_at_most_one_main() {
        let mut input = new_product(vec![], vec![VariantInput::new("S", "Simple")]);
        input.images = vec![ImageInput::new("a.jpg").main(), ImageInput::new("b.jpg").main()];
        assert!(Product::create(input).is_err());

        let mut input = new_product(vec![], vec![VariantInput::new("S", "Simple")]);
        input.images = vec![ImageInput::new("a.jpg"), ImageInput::new("b.jpg")];
        let (product, _) = Product::create(input).unwrap();
        assert_eq!(product.main_image().unwrap().url, "a.jpg");
    }

    #[test]
    fn test_simple_product_without_variation_types() {
        let (product, _) =
            Product::create(new_product(vec![], vec![VariantInput::new("MUG-1", "Mug")])).unwrap();
        assert!(product.variation_type_ids().is_empty());
        assert!(product.variants()[0].options().is_empty());
    }

    #[test]
    fn test_image_management() {
        let f = fixture();
        let mut product = shirt(&f);
        product.add_image(ImageInput::new("front.jpg")).unwrap();
        product.add_image(ImageInput::new("back.jpg").main()).unwrap();
        assert_eq!(product.main_image().unwrap().url, "back.jpg");

        let front = product.images()[0].id;
        product.set_main_image(front).unwrap();
        assert_eq!(product.images().iter().filter(|i| i.is_main).count(), 1);
        assert_eq!(product.main_image().unwrap().id, front);

        product.remove_image(front).unwrap();
        assert_eq!(product.main_image().unwrap().url, "back.jpg");
        assert!(matches!(
            product.remove_image(front),
            Err(CatalogError::ImageNotFound(_))
        ));
    }

    #[test]
    fn test_add_variant_uses_same_validator() {
        let f = fixture();
        let mut product = shirt(&f);

        let err = product
            .add_variant(&VariantInput::new("A-GREEN", "Green"), &[f.color.clone()])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCombination { .. }));

        let err = product
            .add_variant(
                &VariantInput::new("a-red", "Red again").with_option(f.color.id(), f.red),
                &[f.color.clone()],
            )
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateSku(vec!["A-RED".into()]));

        let (variant_id, _) = product
            .add_variant(
                &VariantInput::new("A-RED-2", "Red v2")
                    .with_option(f.color.id(), f.red)
                    .with_price(dec!(12)),
                &[f.color.clone(), f.size.clone()],
            )
            .unwrap();
        assert_eq!(product.variants().len(), 3);
        assert_eq!(product.effective_price(variant_id), Some(dec!(12)));
    }

    #[test]
    fn test_add_variant_requires_type_definitions() {
        let f = fixture();
        let mut product = shirt(&f);
        let err = product
            .add_variant(
                &VariantInput::new("A-X", "x").with_option(f.color.id(), f.red),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn test_remove_last_variant_rejected() {
        let (mut product, _) =
            Product::create(new_product(vec![], vec![VariantInput::new("MUG", "Mug")])).unwrap();
        let only = product.variants()[0].id();
        assert_eq!(product.remove_variant(only), Err(CatalogError::LastVariant));
    }

    #[test]
    fn test_remove_variation_type_rejected_with_variants() {
        let f = fixture();
        let mut product = shirt(&f);
        assert_eq!(
            product.remove_variation_type(f.color.id()),
            Err(CatalogError::VariationTypeLocked(f.color.id()))
        );
        assert_eq!(
            product.remove_variation_type(f.size.id()),
            Err(CatalogError::VariationTypeNotApplied(f.size.id()))
        );
    }

    #[test]
    fn test_add_variation_type_requires_assignment_for_every_variant() {
        let f = fixture();
        let mut product = shirt(&f);
        let red = product.variant_by_sku("a-red").unwrap().id();
        let blue = product.variant_by_sku("A-BLUE").unwrap().id();

        let err = product
            .add_variation_type(&f.size, &[(red, f.small)])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCombination { ref sku, .. } if sku == "A-BLUE"));
        assert_eq!(product.variation_type_ids().len(), 1);

        let err = product
            .add_variation_type(&f.size, &[(red, f.small), (blue, f.red)])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCombination { .. }));

        product
            .add_variation_type(&f.size, &[(red, f.small), (blue, f.large)])
            .unwrap();
        assert_eq!(product.variation_type_ids().len(), 2);
        assert_eq!(
            product.variant(blue).unwrap().options().option_for(f.size.id()),
            Some(f.large)
        );
    }

    #[test]
    fn test_base_price_change_flows_to_effective_price() {
        let f = fixture();
        let mut product = shirt(&f);
        let red = product.variant_by_sku("A-RED").unwrap().id();

        let event = product.update_base_price(dec!(15.00)).unwrap();
        assert!(matches!(event, ProductEvent::PriceChanged(ref e) if e.variant_id.is_none()));
        assert_eq!(product.effective_price(red), Some(dec!(15.00)));
        assert!(product.update_base_price(dec!(-1)).is_err());
        assert_eq!(product.base_price(), dec!(15.00));
    }

    #[test]
    fn test_stock_operations_emit_events_and_bump_version() {
        let f = fixture();
        let mut product = shirt(&f);
        let red = product.variant_by_sku("A-RED").unwrap().id();
        let before = product.variant(red).unwrap().version();

        match product.decrease_stock(red, 2).unwrap() {
            ProductEvent::StockChanged(e) => {
                assert_eq!((e.old_quantity, e.new_quantity), (5, 3));
                assert_eq!(e.reason, StockChangeReason::OrderPlaced);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(product.variant(red).unwrap().version(), before + 1);

        assert!(product.decrease_stock(red, 4).is_err());
        assert_eq!(product.variant(red).unwrap().stock_quantity(), 3);

        product.update_variant_stock(red, 7).unwrap();
        assert_eq!(product.variant(red).unwrap().stock_quantity(), 7);
    }

    #[test]
    fn test_delete_is_soft_and_cascades() {
        let f = fixture();
        let mut product = shirt(&f);
        product.delete().unwrap();

        assert!(product.is_deleted());
        assert!(!product.is_available());
        assert!(product.variants().iter().all(|v| !v.is_active()));
        assert!(matches!(
            product.activate(),
            Err(CatalogError::ProductDeleted(_))
        ));
    }

    #[test]
    fn test_rename_regenerates_slug() {
        let f = fixture();
        let mut product = shirt(&f);
        product.update_details("Heavy Linen Shirt", None).unwrap();
        assert_eq!(product.slug(), "heavy-linen-shirt");
        assert!(product.update_details("!!!", None).is_err());
        assert_eq!(product.name(), "Heavy Linen Shirt");
    }

    #[test]
    fn test_change_category_requires_active() {
        let f = fixture();
        let mut product = shirt(&f);
        let inactive = Category {
            id: CategoryId::new(),
            name: "Old".into(),
            is_active: false,
        };
        assert_eq!(
            product.change_category(&inactive),
            Err(CatalogError::CategoryInactive(inactive.id))
        );
    }

    #[test]
    fn test_price_and_activation_changes_invalidate_stock_reads() {
        let f = fixture();
        let mut product = shirt(&f);
        let versions = |p: &Product| p.variants().iter().map(|v| v.version()).collect::<Vec<_>>();
        let before = versions(&product);

        product.update_base_price(dec!(12.00)).unwrap();
        let after_price = versions(&product);
        assert!(after_price.iter().zip(&before).all(|(a, b)| a > b));

        product.deactivate().unwrap();
        let after_deactivate = versions(&product);
        assert!(after_deactivate.iter().zip(&after_price).all(|(a, b)| a > b));

        product.activate().unwrap();
        let after_activate = versions(&product);
        assert!(after_activate.iter().zip(&after_deactivate).all(|(a, b)| a > b));

        product.update_details("Linen Shirt II", None).unwrap();
        assert_eq!(versions(&product), after_activate);
    }

    proptest! {
        #[test]
        fn prop_selection_keys_match_applied_types(
            picks in prop::collection::vec((0usize..2, 0usize..2), 1..6)
        ) {
            let f = fixture();
            let variants: Vec<_> = picks
                .iter()
                .enumerate()
                .map(|(i, (c, s))| {
                    VariantInput::new(format!("SKU-{i}"), format!("v{i}"))
                        .with_option(f.color.id(), [f.red, f.blue][*c])
                        .with_option(f.size.id(), [f.small, f.large][*s])
                })
                .collect();

            let (product, _) =
                Product::create(new_product(vec![f.color.clone(), f.size.clone()], variants)).unwrap();

            let mut applied = product.variation_type_ids().to_vec();
            applied.sort();
            for variant in product.variants() {
                let keys: Vec<_> = variant.options().type_ids().collect();
                prop_assert_eq!(&keys, &applied);
            }
        }

        #[test]
        fn prop_created_products_have_distinct_skus(
            raw in prop::collection::vec("[a-cA-C]{1,2}", 1..8)
        ) {
            let variants: Vec<_> = raw.iter().map(|s| VariantInput::new(s.clone(), "v")).collect();
            match Product::create(new_product(vec![], variants)) {
                Ok((product, _)) => {
                    let mut skus: Vec<_> = product
                        .variants()
                        .iter()
                        .map(|v| v.sku().as_str().to_lowercase())
                        .collect();
                    let total = skus.len();
                    skus.sort();
                    skus.dedup();
                    prop_assert_eq!(skus.len(), total);
                }
                Err(err) => prop_assert!(matches!(err, CatalogError::DuplicateSku(_))),
            }
        }
    }
}
