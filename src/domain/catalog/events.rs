use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{CategoryId, ImageId, ProductId, VariantId, VariationTypeId};
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Product Events - returned by Product operations, published via the outbox
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    Created(ProductCreated),
    Updated(ProductUpdated),
    PriceChanged(ProductPriceChanged),
    StockChanged(VariantStockChanged),
    Deleted(ProductDeleted),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Created(_) => "ProductCreated",
            ProductEvent::Updated(_) => "ProductUpdated",
            ProductEvent::PriceChanged(_) => "ProductPriceChanged",
            ProductEvent::StockChanged(_) => "VariantStockChanged",
            ProductEvent::Deleted(_) => "ProductDeleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub category_id: CategoryId,
    pub base_price: Decimal,
    pub variant_skus: Vec<String>,
}

/// What changed in a structural update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change")]
pub enum ProductChange {
    Details,
    Category { category_id: CategoryId },
    Activated,
    Deactivated,
    VariationTypeAdded { variation_type_id: VariationTypeId },
    VariationTypeRemoved { variation_type_id: VariationTypeId },
    ImageAdded { image_id: ImageId },
    ImageRemoved { image_id: ImageId },
    MainImageChanged { image_id: ImageId },
    VariantAdded { variant_id: VariantId, sku: String },
    VariantRemoved { variant_id: VariantId, sku: String },
    VariantDetails { variant_id: VariantId },
    VariantActivated { variant_id: VariantId },
    VariantDeactivated { variant_id: VariantId },
    VariantInventoryTracking { variant_id: VariantId, enabled: bool },
    VariantMinStock { variant_id: VariantId, min_stock: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub change: ProductChange,
}

/// `variant_id == None` means the base price changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceChanged {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockChangeReason {
    Adjusted,
    OrderPlaced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStockChanged {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub sku: String,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub reason: StockChangeReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
}
