use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{CategoryId, ImageId, VariantId, VariantOptionId, VariationTypeId};

use super::value_objects::ImageInput;
use super::variant::VariantInput;

// ============================================================================
// Product Commands - intent to change an existing product
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProductCommand {
    UpdateDetails {
        name: String,
        description: Option<String>,
    },
    UpdateBasePrice {
        price: Decimal,
    },
    ChangeCategory {
        category_id: CategoryId,
    },
    Activate,
    Deactivate,
    AddVariationType {
        variation_type_id: VariationTypeId,
        /// One option of the new type for every existing variant
        assignments: Vec<(VariantId, VariantOptionId)>,
    },
    RemoveVariationType {
        variation_type_id: VariationTypeId,
    },
    AddImage {
        image: ImageInput,
    },
    RemoveImage {
        image_id: ImageId,
    },
    SetMainImage {
        image_id: ImageId,
    },
    AddVariant {
        variant: VariantInput,
    },
    RemoveVariant {
        variant_id: VariantId,
    },
    UpdateVariantStock {
        variant_id: VariantId,
        quantity: i64,
    },
    UpdateVariantPrice {
        variant_id: VariantId,
        price: Option<Decimal>,
    },
    UpdateVariantDetails {
        variant_id: VariantId,
        name: String,
        old_price: Option<Decimal>,
    },
    SetVariantActive {
        variant_id: VariantId,
        active: bool,
    },
    SetVariantInventoryTracking {
        variant_id: VariantId,
        enabled: bool,
    },
    SetVariantMinStock {
        variant_id: VariantId,
        min_stock: u32,
    },
    Delete,
}

impl ProductCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ProductCommand::UpdateDetails { .. } => "UpdateDetails",
            ProductCommand::UpdateBasePrice { .. } => "UpdateBasePrice",
            ProductCommand::ChangeCategory { .. } => "ChangeCategory",
            ProductCommand::Activate => "Activate",
            ProductCommand::Deactivate => "Deactivate",
            ProductCommand::AddVariationType { .. } => "AddVariationType",
            ProductCommand::RemoveVariationType { .. } => "RemoveVariationType",
            ProductCommand::AddImage { .. } => "AddImage",
            ProductCommand::RemoveImage { .. } => "RemoveImage",
            ProductCommand::SetMainImage { .. } => "SetMainImage",
            ProductCommand::AddVariant { .. } => "AddVariant",
            ProductCommand::RemoveVariant { .. } => "RemoveVariant",
            ProductCommand::UpdateVariantStock { .. } => "UpdateVariantStock",
            ProductCommand::UpdateVariantPrice { .. } => "UpdateVariantPrice",
            ProductCommand::UpdateVariantDetails { .. } => "UpdateVariantDetails",
            ProductCommand::SetVariantActive { .. } => "SetVariantActive",
            ProductCommand::SetVariantInventoryTracking { .. } => "SetVariantInventoryTracking",
            ProductCommand::SetVariantMinStock { .. } => "SetVariantMinStock",
            ProductCommand::Delete => "Delete",
        }
    }
}
