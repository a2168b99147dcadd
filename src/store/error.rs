//! Document store error types
//!
//! Defines all errors that can occur in the store layer.

use thiserror::Error;

/// Errors that can occur in a document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Document does not exist
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Stored body is not a JSON object or does not match the expected record
    #[error("Invalid document {collection}/{id}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    /// Invalid collection name
    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Backend refused the operation (used by tests and remote backends)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("invoices", "abc");
        assert_eq!(err.to_string(), "Document not found: invoices/abc");
        assert!(err.is_not_found());

        let err = StoreError::InvalidCollection("".to_string());
        assert_eq!(err.to_string(), "Invalid collection name: \"\"");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let store_err: StoreError = json_err.into();
        assert!(matches!(store_err, StoreError::Serialization(_)));
    }
}
