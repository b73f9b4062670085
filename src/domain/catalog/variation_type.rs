use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{VariantOptionId, VariationTypeId};
use crate::errors::FieldError;

use super::errors::CatalogError;
use super::value_objects::{
    check_required, normalize_token, MAX_DISPLAY_LEN, MAX_TOKEN_LEN,
};

// ============================================================================
// VariationType / VariantOption
// ============================================================================
//
// A VariationType is a catalog-level axis ("color") shared by many products.
// Products reference it by id; it is soft-deactivated, never deleted while
// referenced.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOption {
    id: VariantOptionId,
    value: String,
    display_value: String,
    sort_order: u32,
}

impl VariantOption {
    pub fn id(&self) -> VariantOptionId {
        self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn display_value(&self) -> &str {
        &self.display_value
    }

    pub fn sort_order(&self) -> u32 {
        self.sort_order
    }
}

/// Addresses an option either by id or by its (normalized) value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKey {
    Id(VariantOptionId),
    Value(String),
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionKey::Id(id) => write!(f, "{}", id),
            OptionKey::Value(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationType {
    id: VariationTypeId,
    name: String,
    display_name: String,
    is_active: bool,
    options: Vec<VariantOption>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VariationType {
    pub fn create(name: &str, display_name: &str) -> Result<Self, CatalogError> {
        let name = normalize_token(name);
        let mut errors = Vec::new();
        check_required(&mut errors, "name", &name, MAX_TOKEN_LEN);
        check_required(&mut errors, "display_name", display_name, MAX_DISPLAY_LEN);
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let now = Utc::now();
        Ok(Self {
            id: VariationTypeId::new(),
            name,
            display_name: display_name.trim().to_string(),
            is_active: true,
            options: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> VariationTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn options(&self) -> &[VariantOption] {
        &self.options
    }

    /// Options in UI order: sort order, then value
    pub fn options_sorted(&self) -> Vec<&VariantOption> {
        let mut sorted: Vec<&VariantOption> = self.options.iter().collect();
        sorted.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.value.cmp(&b.value))
        });
        sorted
    }

    pub fn has_option(&self, option_id: VariantOptionId) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    pub fn find_option(&self, key: &OptionKey) -> Option<&VariantOption> {
        match key {
            OptionKey::Id(id) => self.options.iter().find(|o| o.id == *id),
            OptionKey::Value(value) => {
                let value = normalize_token(value);
                self.options.iter().find(|o| o.value == value)
            }
        }
    }

    pub fn add_option(
        &mut self,
        value: &str,
        display_value: &str,
        sort_order: u32,
    ) -> Result<VariantOptionId, CatalogError> {
        let value = normalize_token(value);
        Self::validate_option_fields(&value, display_value)?;

        if self.options.iter().any(|o| o.value == value) {
            return Err(CatalogError::DuplicateOption {
                type_name: self.name.clone(),
                value,
            });
        }

        let option = VariantOption {
            id: VariantOptionId::new(),
            value,
            display_value: display_value.trim().to_string(),
            sort_order,
        };
        let id = option.id;
        self.options.push(option);
        self.updated_at = Utc::now();
        Ok(id)
    }

    pub fn update_option(
        &mut self,
        key: &OptionKey,
        value: &str,
        display_value: &str,
        sort_order: u32,
    ) -> Result<(), CatalogError> {
        let value = normalize_token(value);
        Self::validate_option_fields(&value, display_value)?;

        let target = self
            .find_option(key)
            .map(|o| o.id)
            .ok_or_else(|| CatalogError::OptionNotFound(key.to_string()))?;

        if self
            .options
            .iter()
            .any(|o| o.id != target && o.value == value)
        {
            return Err(CatalogError::DuplicateOption {
                type_name: self.name.clone(),
                value,
            });
        }

        if let Some(option) = self.options.iter_mut().find(|o| o.id == target) {
            option.value = value;
            option.display_value = display_value.trim().to_string();
            option.sort_order = sort_order;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove an option unless a product variant still selects it.
    /// `is_referenced` is answered by the catalog repository.
    pub fn remove_option<F>(
        &mut self,
        key: &OptionKey,
        is_referenced: F,
    ) -> Result<VariantOption, CatalogError>
    where
        F: FnOnce(VariantOptionId) -> bool,
    {
        let idx = match key {
            OptionKey::Id(id) => self.options.iter().position(|o| o.id == *id),
            OptionKey::Value(value) => {
                let value = normalize_token(value);
                self.options.iter().position(|o| o.value == value)
            }
        }
        .ok_or_else(|| CatalogError::OptionNotFound(key.to_string()))?;

        if is_referenced(self.options[idx].id) {
            return Err(CatalogError::OptionInUse(self.options[idx].value.clone()));
        }

        self.updated_at = Utc::now();
        Ok(self.options.remove(idx))
    }

    pub fn update_display_name(&mut self, display_name: &str) -> Result<(), CatalogError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "display_name", display_name, MAX_DISPLAY_LEN);
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }
        self.display_name = display_name.trim().to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    fn validate_option_fields(value: &str, display_value: &str) -> Result<(), CatalogError> {
        let mut errors: Vec<FieldError> = Vec::new();
        check_required(&mut errors, "value", value, MAX_TOKEN_LEN);
        check_required(&mut errors, "display_value", display_value, MAX_DISPLAY_LEN);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(errors))
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
