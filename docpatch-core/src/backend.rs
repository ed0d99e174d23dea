//! Storage backend abstraction for the document store.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait is the external store collaborator: it executes batches of
//! [`Command`]s and answers metadata lookups. Patch compilation never talks to it; only
//! [`StoreCommands`](crate::commands::StoreCommands) does. Implementations are required to be
//! thread-safe (`Send + Sync`) and support concurrent access.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docpatch::backend::StoreBackend;
//!
//! let backend = MyBackendImpl::new();
//! let results = backend.batch(vec![command.into()]).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    command::{BatchResult, Command},
    error::DocumentStoreResult,
    metadata::JsonDocumentMetadata,
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// tasks. The trait requires `Send + Sync` bounds.
///
/// # Errors
///
/// Backends report store failures with the matching
/// [`DocumentStoreError`](crate::error::DocumentStoreError) variant: `Concurrency` for a
/// token or previous-value mismatch, `Backend` for anything else.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Executes a batch of commands, returning one result per command in order.
    ///
    /// A batch is all-or-nothing: if any command fails, no command takes effect.
    async fn batch(&self, commands: Vec<Command>) -> DocumentStoreResult<Vec<BatchResult>>;

    /// Fetches the metadata of one document, or `None` if it does not exist.
    async fn head(&self, key: &str) -> DocumentStoreResult<Option<JsonDocumentMetadata>>;

    /// Fetches the metadata of several documents.
    ///
    /// Missing documents are omitted from the result.
    async fn get_metadata(&self, keys: Vec<String>) -> DocumentStoreResult<Vec<JsonDocumentMetadata>>;

    /// Gracefully shuts down the backend.
    ///
    /// Default implementation does nothing.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn batch(&self, commands: Vec<Command>) -> DocumentStoreResult<Vec<BatchResult>> {
        (*self).batch(commands).await
    }

    async fn head(&self, key: &str) -> DocumentStoreResult<Option<JsonDocumentMetadata>> {
        (*self).head(key).await
    }

    async fn get_metadata(&self, keys: Vec<String>) -> DocumentStoreResult<Vec<JsonDocumentMetadata>> {
        (*self).get_metadata(keys).await
    }
}

/// Factory trait for constructing storage backend instances.
///
/// # Example
///
/// ```ignore
/// use docpatch::backend::StoreBackendBuilder;
///
/// let backend = InMemoryStoreBuilder::new().build().await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[async_trait]
pub trait StoreBackendBuilder {
    /// The concrete backend type this builder produces.
    type Backend: StoreBackend;

    /// Builds and initializes a new backend instance.
    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
