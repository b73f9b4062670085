use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::catalog::CatalogError;
use crate::domain::order::OrderError;
use crate::store::StoreError;

// ============================================================================
// Application Error Taxonomy
// ============================================================================
//
// Every operation exposed to the outer layers returns `AppError`. Domain
// errors keep their own enums (one per aggregate) and are classified here.
//
// - Validation / Conflict messages are safe to show verbatim
// - Internal errors carry only a correlation id; details go to the log
//
// ============================================================================

/// A single field-level validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub(crate) fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Metric label value
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error (reference {correlation_id})")]
    Internal { correlation_id: Uuid },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Log the full failure server-side and hand back an opaque reference
    pub fn internal(source: impl fmt::Display) -> Self {
        let correlation_id = Uuid::new_v4();
        tracing::error!(
            correlation_id = %correlation_id,
            error = %source,
            "Internal failure"
        );
        AppError::Internal { correlation_id }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation(fields) => fields,
            _ => &[],
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(fields) => AppError::Validation(fields),
            CatalogError::VariantNotFound(id) => AppError::not_found("variant", id),
            CatalogError::ImageNotFound(id) => AppError::not_found("image", id),
            CatalogError::OptionNotFound(key) => AppError::not_found("variant option", key),
            CatalogError::ProductDeleted(id) => AppError::not_found("product", id),
            other => match other.kind() {
                ErrorKind::Conflict => AppError::Conflict(other.to_string()),
                _ => AppError::Validation(vec![FieldError::new(other.field(), other.to_string())]),
            },
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidAddress(fields) => AppError::Validation(fields),
            OrderError::NotInitialized => AppError::internal(err),
            other => AppError::Validation(vec![FieldError::new(other.field(), other.to_string())]),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict { entity, id, .. } => AppError::Conflict(format!(
                "{} {} was modified concurrently, reload and retry",
                entity, id
            )),
            StoreError::DuplicateKey { entity, key } => {
                AppError::Conflict(format!("{} {} already exists", entity, key))
            }
            other => AppError::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_field() {
        let err = AppError::Validation(vec![
            FieldError::new("name", "is required"),
            FieldError::new("base_price", "must be greater than zero"),
        ]);

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "validation failed: name: is required; base_price: must be greater than zero"
        );
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let err = AppError::internal("connection refused to 10.0.0.1:5432");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.to_string().contains("10.0.0.1"));
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err: AppError = StoreError::ConcurrencyConflict {
            entity: "product",
            id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: AppError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
