//! Service layer errors
//!
//! Shared by the generic entity engine and the clinic services.

use thiserror::Error;

use super::validation::ValidationErrors;
use crate::saga::SagaError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Submitted record failed field checks
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{collection} {id} not found")]
    NotFound { collection: String, id: String },

    /// A referenced record is missing or unusable
    #[error("Invalid reference: {0}")]
    Reference(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error("Export failed: {0}")]
    Export(String),
}

impl ServiceError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        ServiceError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        ServiceError::Validation(errors)
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => ServiceError::NotFound { collection, id },
            other => ServiceError::Store(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

impl From<csv::Error> for ServiceError {
    fn from(err: csv::Error) -> Self {
        ServiceError::Export(err.to_string())
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: ServiceError = StoreError::not_found("invoices", "x").into();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let err: ServiceError = StoreError::Lock("poisoned".to_string()).into();
        assert!(matches!(err, ServiceError::Store(_)));
    }

    #[test]
    fn test_invalid_single_field() {
        match ServiceError::invalid("amount", "El monto debe ser mayor o igual a 0") {
            ServiceError::Validation(errors) => assert!(errors.contains("amount")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
