use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ProductId, VariantId, VariantOptionId, VariationTypeId};
use crate::errors::FieldError;

use super::errors::CatalogError;
use super::value_objects::{
    check_price, check_required, OptionSelection, Sku, MAX_PRODUCT_NAME_LEN,
};

// ============================================================================
// ProductVariant - one purchasable SKU, owned by a Product
// ============================================================================
//
// Constructors and mutators are `pub(super)`: only the Product aggregate in
// this module can create or change a variant. Every mutation that order
// placement depends on (stock, price, availability, tracking) bumps
// `version`, which the store compares at commit time. Product-level edits
// that change the same facts (base price, product activation) bump it
// through `invalidate_reads`.
//
// ============================================================================

/// Caller input for one variant, used at product creation and by add-variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantInput {
    pub sku: String,
    pub name: String,
    pub price: Option<Decimal>,
    pub old_price: Option<Decimal>,
    pub stock_quantity: i64,
    pub min_stock: u32,
    pub track_inventory: bool,
    pub options: Vec<(VariationTypeId, VariantOptionId)>,
}

impl VariantInput {
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            price: None,
            old_price: None,
            stock_quantity: 0,
            min_stock: 0,
            track_inventory: true,
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, type_id: VariationTypeId, option_id: VariantOptionId) -> Self {
        self.options.push((type_id, option_id));
        self
    }

    pub fn with_stock(mut self, quantity: i64) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track_inventory = false;
        self
    }

    /// Field checks that don't need the product context. `prefix` locates
    /// the input in error messages, e.g. `variants[2]`.
    pub(super) fn check_fields(&self, prefix: &str) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required(&mut errors, &format!("{prefix}.name"), &self.name, MAX_PRODUCT_NAME_LEN);
        if let Some(price) = self.price {
            check_price(&mut errors, &format!("{prefix}.price"), price);
        }
        if let Some(old_price) = self.old_price {
            check_price(&mut errors, &format!("{prefix}.old_price"), old_price);
        }
        if self.stock_quantity < 0 {
            errors.push(FieldError::new(
                format!("{prefix}.stock_quantity"),
                "must not be negative",
            ));
        } else if u32::try_from(self.stock_quantity).is_err() {
            errors.push(FieldError::new(
                format!("{prefix}.stock_quantity"),
                "is too large",
            ));
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    id: VariantId,
    product_id: ProductId,
    sku: Sku,
    name: String,
    price_override: Option<Decimal>,
    old_price: Option<Decimal>,
    stock_quantity: u32,
    min_stock: u32,
    is_active: bool,
    track_inventory: bool,
    version: u64,
    options: OptionSelection,
}

impl ProductVariant {
    /// Build from input that already passed `check_fields` and the
    /// combination validator.
    pub(super) fn create(
        product_id: ProductId,
        sku: Sku,
        input: &VariantInput,
        options: OptionSelection,
    ) -> Self {
        Self {
            id: VariantId::new(),
            product_id,
            sku,
            name: input.name.trim().to_string(),
            price_override: input.price,
            old_price: input.old_price,
            stock_quantity: u32::try_from(input.stock_quantity).unwrap_or(0),
            min_stock: input.min_stock,
            is_active: true,
            track_inventory: input.track_inventory,
            version: 1,
            options,
        }
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price_override(&self) -> Option<Decimal> {
        self.price_override
    }

    pub fn old_price(&self) -> Option<Decimal> {
        self.old_price
    }

    pub fn stock_quantity(&self) -> u32 {
        self.stock_quantity
    }

    pub fn min_stock(&self) -> u32 {
        self.min_stock
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn tracks_inventory(&self) -> bool {
        self.track_inventory
    }

    /// Concurrency token compared by the store on write
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn options(&self) -> &OptionSelection {
        &self.options
    }

    /// Always recomputed from the current base price, never cached
    pub fn effective_price(&self, base_price: Decimal) -> Decimal {
        self.price_override.unwrap_or(base_price)
    }

    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.stock_quantity <= self.min_stock
    }

    pub fn can_fulfil(&self, quantity: u32) -> bool {
        !self.track_inventory || self.stock_quantity >= quantity
    }

    pub(super) fn update_stock(&mut self, quantity: i64) -> Result<u32, CatalogError> {
        if !self.track_inventory {
            return Err(CatalogError::InventoryNotTracked(self.sku.to_string()));
        }
        let quantity = u32::try_from(quantity).map_err(|_| {
            CatalogError::invalid("stock_quantity", "must be between 0 and 4294967295")
        })?;

        let previous = self.stock_quantity;
        self.stock_quantity = quantity;
        self.version += 1;
        Ok(previous)
    }

    pub(super) fn decrease_stock(&mut self, amount: u32) -> Result<u32, CatalogError> {
        if amount == 0 {
            return Err(CatalogError::invalid("quantity", "must be greater than zero"));
        }
        if !self.track_inventory {
            return Err(CatalogError::InventoryNotTracked(self.sku.to_string()));
        }
        let remaining = self.stock_quantity.checked_sub(amount).ok_or_else(|| {
            CatalogError::InsufficientStock {
                sku: self.sku.to_string(),
                requested: amount,
                available: self.stock_quantity,
            }
        })?;

        let previous = self.stock_quantity;
        self.stock_quantity = remaining;
        self.version += 1;
        Ok(previous)
    }

    pub(super) fn update_price(
        &mut self,
        price: Option<Decimal>,
    ) -> Result<Option<Decimal>, CatalogError> {
        if let Some(price) = price {
            let mut errors = Vec::new();
            check_price(&mut errors, "price", price);
            if !errors.is_empty() {
                return Err(CatalogError::Validation(errors));
            }
        }

        let previous = self.price_override;
        self.price_override = price;
        self.version += 1;
        Ok(previous)
    }

    pub(super) fn update_details(
        &mut self,
        name: &str,
        old_price: Option<Decimal>,
    ) -> Result<(), CatalogError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "name", name, MAX_PRODUCT_NAME_LEN);
        if let Some(old_price) = old_price {
            check_price(&mut errors, "old_price", old_price);
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        self.name = name.trim().to_string();
        self.old_price = old_price;
        Ok(())
    }

    pub(super) fn set_min_stock(&mut self, min_stock: u32) {
        self.min_stock = min_stock;
    }

    pub(super) fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.version += 1;
    }

    pub(super) fn set_track_inventory(&mut self, track: bool) {
        self.track_inventory = track;
        self.version += 1;
    }

    /// The owning product changed something a stock read depends on
    pub(super) fn invalidate_reads(&mut self) {
        self.version += 1;
    }

    pub(super) fn extend_options(
        &mut self,
        type_id: VariationTypeId,
        option_id: VariantOptionId,
    ) -> Result<(), CatalogError> {
        self.options = self.options.with_entry(type_id, option_id).ok_or(
            CatalogError::VariationTypeAlreadyApplied(type_id),
        )?;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn variant(stock: i64) -> ProductVariant {
        let input = VariantInput::new("a-red", "Red").with_stock(stock);
        let sku = Sku::parse(&input.sku, "sku").unwrap();
        ProductVariant::create(ProductId::new(), sku, &input, OptionSelection::default())
    }

    #[test]
    fn test_effective_price_falls_back_to_base() {
        let mut v = variant(1);
        assert_eq!(v.effective_price(dec!(10.00)), dec!(10.00));
        assert_eq!(v.effective_price(dec!(12.50)), dec!(12.50));

        v.update_price(Some(dec!(8.00))).unwrap();
        assert_eq!(v.effective_price(dec!(12.50)), dec!(8.00));

        v.update_price(None).unwrap();
        assert_eq!(v.effective_price(dec!(12.50)), dec!(12.50));
    }

    #[test]
    fn test_price_must_be_positive() {
        let mut v = variant(1);
        let before = v.version();
        assert!(v.update_price(Some(dec!(0))).is_err());
        assert!(v.update_price(Some(dec!(-1))).is_err());
        assert_eq!(v.version(), before);
    }

    #[test]
    fn test_decrease_stock_never_goes_negative() {
        let mut v = variant(3);
        let err = v.decrease_stock(5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient stock for A-RED: requested 5, available 3"
        );
        assert_eq!(v.stock_quantity(), 3);
        assert_eq!(v.version(), 1);

        assert_eq!(v.decrease_stock(3).unwrap(), 3);
        assert_eq!(v.stock_quantity(), 0);
        assert_eq!(v.version(), 2);
    }

    #[test]
    fn test_update_stock_rules() {
        let mut v = variant(2);
        assert!(v.update_stock(-1).is_err());
        assert_eq!(v.update_stock(10).unwrap(), 2);
        assert_eq!(v.stock_quantity(), 10);

        v.set_track_inventory(false);
        assert!(matches!(
            v.update_stock(4),
            Err(CatalogError::InventoryNotTracked(_))
        ));
        assert!(v.can_fulfil(1_000));
    }

    #[test]
    fn test_low_stock_threshold() {
        let mut v = variant(2);
        v.set_min_stock(2);
        assert!(v.is_low_stock());
        v.update_stock(3).unwrap();
        assert!(!v.is_low_stock());
    }

    #[test]
    fn test_input_field_checks() {
        let mut input = VariantInput::new("X", "");
        input.stock_quantity = -4;
        input.price = Some(dec!(0));
        let fields: Vec<_> = input
            .check_fields("variants[1]")
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec!["variants[1].name", "variants[1].price", "variants[1].stock_quantity"]
        );
    }
}
