//! Error types and result types for patch compilation and store operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised by the patch compiler or reported by a store backend.
///
/// `ArgumentNull` and `InvalidSelector` signal programming errors at the call site and are
/// always raised before any builder state changes. The remaining variants describe failures
/// reported by the store collaborator and are propagated unchanged.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A required argument was missing, empty, or serialized to `null`.
    #[error("Argument must not be null or empty: {0}")]
    ArgumentNull(&'static str),
    /// The selector is not a pure field-access chain over the root type.
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector {
        /// The selector source text.
        selector: String,
        /// Why the selector was rejected.
        reason: String,
    },
    /// A scripted patch parameter name was given more than once.
    #[error("Duplicate scripted patch parameter: {0}")]
    DuplicateParameter(String),
    /// Serialization error when converting values to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Invalid store configuration or connection string.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A concurrency token or previous-value check failed.
    #[error("Concurrency conflict on document {key}: {reason}")]
    Concurrency {
        /// The document key.
        key: String,
        /// What did not match.
        reason: String,
    },
    /// The requested document was not found.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    /// An error occurred in the underlying store backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for patch compilation and store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    pub(crate) fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        DocumentStoreError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
