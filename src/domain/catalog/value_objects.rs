use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ids::{CategoryId, ImageId, VariantOptionId, VariationTypeId};
use crate::errors::FieldError;

// ============================================================================
// Catalog Value Objects
// ============================================================================

pub const MAX_TOKEN_LEN: usize = 50;
pub const MAX_DISPLAY_LEN: usize = 100;
pub const MAX_PRODUCT_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_SKU_LEN: usize = 50;

/// Lowercase, trimmed, with inner whitespace runs collapsed to a single `-`.
/// Used for variation type names and option values.
pub fn normalize_token(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) fn check_required(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    max_len: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, "is required"));
    } else if len > max_len {
        errors.push(FieldError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }
}

pub(crate) fn check_optional(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<&str>,
    max_len: usize,
) {
    if let Some(value) = value {
        if value.chars().count() > max_len {
            errors.push(FieldError::new(
                field,
                format!("must be at most {} characters", max_len),
            ));
        }
    }
}

pub(crate) fn check_price(errors: &mut Vec<FieldError>, field: &str, price: Decimal) {
    if price <= Decimal::ZERO {
        errors.push(FieldError::new(field, "must be greater than zero"));
    }
}

/// Stock keeping unit, normalized to uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Accepts `A-Z`, `0-9`, `-`, `_` and `.` after trimming and uppercasing
    pub fn parse(raw: &str, field: &str) -> Result<Self, FieldError> {
        let normalized = raw.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(FieldError::new(field, "SKU is required"));
        }
        if normalized.chars().count() > MAX_SKU_LEN {
            return Err(FieldError::new(
                field,
                format!("SKU must be at most {} characters", MAX_SKU_LEN),
            ));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(FieldError::new(
                field,
                format!("malformed SKU pattern: {}", raw.trim()),
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL slug derived from a product name: `"Linen Shirt (Slim)"` -> `"linen-shirt-slim"`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Category as reported by the category collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_main: bool,
    pub sort_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInput {
    pub url: String,
    pub alt_text: Option<String>,
    pub is_main: bool,
}

impl ImageInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt_text: None,
            is_main: false,
        }
    }

    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }
}

/// The option chosen for each variation type of a variant.
///
/// Kept sorted by type id with at most one entry per type. Only the
/// combination validator builds these from raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSelection(Vec<(VariationTypeId, VariantOptionId)>);

impl OptionSelection {
    pub(crate) fn from_sorted(entries: Vec<(VariationTypeId, VariantOptionId)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self(entries)
    }

    pub fn option_for(&self, type_id: VariationTypeId) -> Option<VariantOptionId> {
        self.0
            .binary_search_by_key(&type_id, |(t, _)| *t)
            .ok()
            .map(|idx| self.0[idx].1)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = VariationTypeId> + '_ {
        self.0.iter().map(|(t, _)| *t)
    }

    pub fn option_ids(&self) -> impl Iterator<Item = VariantOptionId> + '_ {
        self.0.iter().map(|(_, o)| *o)
    }

    pub fn entries(&self) -> &[(VariationTypeId, VariantOptionId)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with one more axis; fails if the axis is already present
    pub(crate) fn with_entry(
        &self,
        type_id: VariationTypeId,
        option_id: VariantOptionId,
    ) -> Option<Self> {
        match self.0.binary_search_by_key(&type_id, |(t, _)| *t) {
            Ok(_) => None,
            Err(idx) => {
                let mut entries = self.0.clone();
                entries.insert(idx, (type_id, option_id));
                Some(Self(entries))
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  Color "), "color");
        assert_eq!(normalize_token("Sky   Blue"), "sky-blue");
        assert_eq!(normalize_token("   "), "");
    }

    #[test]
    fn test_sku_is_uppercased_and_trimmed() {
        let sku = Sku::parse("  a-red ", "sku").unwrap();
        assert_eq!(sku.as_str(), "A-RED");
        assert_eq!(sku, Sku::parse("A-RED", "sku").unwrap());
    }

    #[test]
    fn test_sku_rejects_bad_input() {
        assert!(Sku::parse("", "sku").is_err());
        assert!(Sku::parse("A RED", "sku").is_err());
        assert!(Sku::parse(&"X".repeat(MAX_SKU_LEN + 1), "sku").is_err());

        let err = Sku::parse("A/RED", "variants[0].sku").unwrap_err();
        assert_eq!(err.field, "variants[0].sku");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Linen Shirt (Slim)"), "linen-shirt-slim");
        assert_eq!(slugify("  --Mug--  "), "mug");
        assert_eq!(slugify("T-Shirt 2024"), "t-shirt-2024");
    }

    #[test]
    fn test_option_selection_lookup_and_extend() {
        let color = VariationTypeId::new();
        let red = VariantOptionId::new();
        let selection = OptionSelection::from_sorted(vec![(color, red)]);

        assert_eq!(selection.option_for(color), Some(red));
        assert_eq!(selection.option_for(VariationTypeId::new()), None);

        let size = VariationTypeId::new();
        let small = VariantOptionId::new();
        let extended = selection.with_entry(size, small).unwrap();
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.option_for(size), Some(small));
        assert!(extended.with_entry(color, VariantOptionId::new()).is_none());
    }
}
