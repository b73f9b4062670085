// ============================================================================
// Catalog Domain - Products, Variants and Variation Types
// ============================================================================
//
// This module contains ALL catalog-specific code:
// - Value objects (Sku, slug, Category, images, OptionSelection)
// - VariationType / VariantOption
// - Combination validator for variant option selections
// - ProductVariant (owned by Product, mutated only through it)
// - Product aggregate
// - Events, commands, errors
// - Command Handler (CatalogCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod variation_type;
pub mod combination;
pub mod variant;
pub mod product;
pub mod events;
pub mod commands;
pub mod errors;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use variation_type::*;
pub use combination::*;
pub use variant::*;
pub use product::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use command_handler::*;
