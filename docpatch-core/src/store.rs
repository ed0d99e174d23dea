//! The explicit store handle tying a backend to its conventions.
//!
//! A [`DocumentStore`] is where patch builders come from: it hands them the conventions'
//! serializer settings, and executes what they build through [`StoreCommands`].
//!
//! # Example
//!
//! ```ignore
//! use docpatch::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//!
//! let mut patch = store.patch::<BlogPost>("blog-posts/1")?;
//! patch.set(&select!(BlogPost, |p| p.title)?, "Hello")?;
//!
//! store.commands().patch(patch.build(), false).await?;
//! ```

use crate::{
    backend::StoreBackend,
    commands::StoreCommands,
    conventions::Conventions,
    error::DocumentStoreResult,
    patch::DocumentPatch,
    schema::Schema,
    script::ScriptedPatch,
};

/// A document store bound to one backend.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    conventions: Conventions,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a store with default conventions.
    pub fn new(backend: B) -> Self {
        Self::with_conventions(backend, Conventions::default())
    }

    pub fn with_conventions(backend: B, conventions: Conventions) -> Self {
        Self {
            backend,
            conventions,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Starts a typed patch for the document with the given key.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`](crate::error::DocumentStoreError::ArgumentNull)
    /// if `key` is empty.
    pub fn patch<T: Schema>(&self, key: impl Into<String>) -> DocumentStoreResult<DocumentPatch<T>> {
        DocumentPatch::new(key, self.conventions.serializer().clone())
    }

    /// Starts a scripted patch for the document with the given key.
    ///
    /// Parameters are converted with the conventions' serializer.
    pub fn script(&self, key: impl Into<String>) -> DocumentStoreResult<ScriptedPatch> {
        ScriptedPatch::new(key, self.conventions.serializer().clone())
    }

    /// Command execution against this store's backend.
    pub fn commands(&self) -> StoreCommands<'_, B> {
        StoreCommands::new(&self.backend, &self.conventions)
    }

    /// Shuts down the store and its backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        tracing::debug!("Shutting down document store");

        self.backend.shutdown().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docpatch_macros::Schema;
    use serde_json::json;

    use crate::{
        command::{BatchResult, Command},
        conventions::JsonSerializer,
        error::DocumentStoreError,
        metadata::JsonDocumentMetadata,
        selector::Selector,
    };

    #[derive(Debug)]
    struct NullBackend;

    #[async_trait]
    impl StoreBackend for NullBackend {
        async fn batch(&self, _commands: Vec<Command>) -> DocumentStoreResult<Vec<BatchResult>> {
            Err(DocumentStoreError::Backend("offline".to_string()))
        }

        async fn head(&self, _key: &str) -> DocumentStoreResult<Option<JsonDocumentMetadata>> {
            Ok(None)
        }

        async fn get_metadata(&self, _keys: Vec<String>) -> DocumentStoreResult<Vec<JsonDocumentMetadata>> {
            Ok(Vec::new())
        }
    }

    #[allow(dead_code)]
    #[derive(Schema)]
    struct Note {
        body: Option<String>,
    }

    #[test]
    fn test_patch_uses_conventions_serializer() {
        let conventions = Conventions::default().with_serializer(JsonSerializer::new().ignore_null_values(false));
        let store = DocumentStore::with_conventions(NullBackend, conventions);

        let mut patch = store.patch::<Note>("notes/1").unwrap();
        patch
            .set(&Selector::parse("|n| n.body").unwrap(), &json!({"a": null}))
            .unwrap();

        assert_eq!(patch.build().patches()[0].value(), Some(&json!({"a": null})));
    }

    #[test]
    fn test_builders_reject_empty_keys() {
        let store = DocumentStore::new(NullBackend);

        assert!(matches!(store.patch::<Note>(""), Err(DocumentStoreError::ArgumentNull("key"))));
        assert!(matches!(store.script(""), Err(DocumentStoreError::ArgumentNull("key"))));
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let store = DocumentStore::new(NullBackend);

        let result = store.commands().delete("notes/1", None).await;
        assert!(matches!(result, Err(DocumentStoreError::Backend(reason)) if reason == "offline"));

        store.shutdown().await.unwrap();
    }
}
