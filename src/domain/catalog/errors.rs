use crate::domain::ids::{CategoryId, ImageId, ProductId, VariantId, VariationTypeId};
use crate::errors::{join_fields, ErrorKind, FieldError};

use super::combination::{describe_combination_errors, CombinationError};

// ============================================================================
// Catalog Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("{}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("duplicate SKU: {}", .0.join(", "))]
    DuplicateSku(Vec<String>),

    #[error("SKU already in use: {0}")]
    SkuTaken(String),

    #[error("slug already in use: {0}")]
    SlugTaken(String),

    #[error("variant {sku} has an invalid option selection: {}", describe_combination_errors(.errors))]
    InvalidCombination {
        sku: String,
        errors: Vec<CombinationError>,
    },

    #[error("variation type {0} is inactive")]
    InactiveVariationType(String),

    #[error("variation type {0} is listed more than once")]
    DuplicateVariationType(VariationTypeId),

    #[error("option {value} already exists in variation type {type_name}")]
    DuplicateOption { type_name: String, value: String },

    #[error("option not found: {0}")]
    OptionNotFound(String),

    #[error("option {0} is referenced by existing variants")]
    OptionInUse(String),

    #[error("variation type {0} cannot be removed while variants exist")]
    VariationTypeLocked(VariationTypeId),

    #[error("variation type {0} is already applied to this product")]
    VariationTypeAlreadyApplied(VariationTypeId),

    #[error("variation type {0} is not applied to this product")]
    VariationTypeNotApplied(VariationTypeId),

    #[error("variant not found: {0}")]
    VariantNotFound(VariantId),

    #[error("image not found: {0}")]
    ImageNotFound(ImageId),

    #[error("a product must keep at least one variant")]
    LastVariant,

    #[error("inventory is not tracked for {0}")]
    InventoryNotTracked(String),

    #[error("insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: u32,
        available: u32,
    },

    #[error("product {0} is deleted")]
    ProductDeleted(ProductId),

    #[error("category {0} is not active")]
    CategoryInactive(CategoryId),
}

impl CatalogError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::SkuTaken(_)
            | CatalogError::SlugTaken(_)
            | CatalogError::InsufficientStock { .. } => ErrorKind::Conflict,
            CatalogError::VariantNotFound(_)
            | CatalogError::ImageNotFound(_)
            | CatalogError::OptionNotFound(_)
            | CatalogError::ProductDeleted(_) => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
        }
    }

    /// Field the error is reported against
    pub fn field(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "product",
            CatalogError::DuplicateSku(_) | CatalogError::SkuTaken(_) => "sku",
            CatalogError::SlugTaken(_) => "slug",
            CatalogError::InvalidCombination { .. } => "options",
            CatalogError::InactiveVariationType(_)
            | CatalogError::DuplicateVariationType(_)
            | CatalogError::VariationTypeLocked(_)
            | CatalogError::VariationTypeAlreadyApplied(_)
            | CatalogError::VariationTypeNotApplied(_) => "variation_types",
            CatalogError::DuplicateOption { .. }
            | CatalogError::OptionNotFound(_)
            | CatalogError::OptionInUse(_) => "options",
            CatalogError::VariantNotFound(_) | CatalogError::LastVariant => "variants",
            CatalogError::ImageNotFound(_) => "images",
            CatalogError::InventoryNotTracked(_) | CatalogError::InsufficientStock { .. } => {
                "stock_quantity"
            }
            CatalogError::ProductDeleted(_) => "product",
            CatalogError::CategoryInactive(_) => "category_id",
        }
    }
}
