//! Command execution against a [`StoreBackend`].
//!
//! [`StoreCommands`] is the only place compiled commands meet the store. It wraps the raw
//! batch interface with single-command helpers and maps store outcomes onto
//! [`DocumentStoreError`] variants.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::instrument;

use crate::{
    backend::StoreBackend,
    command::{BatchResult, Command, DeleteCommand, Etag, PatchResult, PutCommand},
    conventions::Conventions,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    metadata::{DocumentMetadata, ENTITY_NAME},
    patch::PatchCommand,
    script::ScriptedPatchCommand,
};

/// Executes commands against a backend using a store's conventions.
#[derive(Debug)]
pub struct StoreCommands<'a, B: StoreBackend> {
    backend: &'a B,
    conventions: &'a Conventions,
}

impl<'a, B: StoreBackend> StoreCommands<'a, B> {
    pub fn new(backend: &'a B, conventions: &'a Conventions) -> Self {
        Self {
            backend,
            conventions,
        }
    }

    /// Executes a single command.
    ///
    /// # Errors
    ///
    /// Propagates store errors, and returns [`DocumentStoreError::Backend`] if the store
    /// does not answer with exactly one result.
    #[instrument(skip(self, command), fields(key = command.key(), method = ?command.method()))]
    pub async fn execute(&self, command: Command) -> DocumentStoreResult<BatchResult> {
        let mut results = self.backend.batch(vec![command]).await?;

        if results.len() != 1 {
            return Err(DocumentStoreError::Backend(format!(
                "expected exactly one batch result, got {}",
                results.len()
            )));
        }

        Ok(results.remove(0))
    }

    /// Executes several commands as one atomic batch.
    #[instrument(skip(self, commands), fields(count = commands.len()))]
    pub async fn execute_many(&self, commands: Vec<Command>) -> DocumentStoreResult<Vec<BatchResult>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        let expected = commands.len();
        let results = self.backend.batch(commands).await?;

        if results.len() != expected {
            return Err(DocumentStoreError::Backend(format!(
                "expected {expected} batch results, got {}",
                results.len()
            )));
        }

        tracing::debug!(count = expected, "Executed batch");

        Ok(results)
    }

    /// Whether a document with the given key exists.
    pub async fn exists(&self, key: &str) -> DocumentStoreResult<bool> {
        Ok(self.load_metadata(key).await?.is_some())
    }

    /// Loads the metadata of one document.
    #[instrument(skip(self))]
    pub async fn load_metadata(&self, key: &str) -> DocumentStoreResult<Option<DocumentMetadata>> {
        require_key(key)?;

        Ok(self
            .backend
            .head(key)
            .await?
            .as_ref()
            .map(DocumentMetadata::from_descriptor))
    }

    /// Loads the metadata of several documents.
    ///
    /// Duplicate keys are requested once; the first occurrence decides the order.
    #[instrument(skip(self, keys))]
    pub async fn load_metadata_many<I, K>(&self, keys: I) -> DocumentStoreResult<Vec<DocumentMetadata>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|key| seen.insert(key.clone()))
            .collect();

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .backend
            .get_metadata(keys)
            .await?
            .iter()
            .map(DocumentMetadata::from_descriptor)
            .collect())
    }

    /// Deletes a document, returning whether anything was deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str, etag: Option<Etag>) -> DocumentStoreResult<bool> {
        require_key(key)?;

        let result = self
            .execute(
                DeleteCommand {
                    key: key.to_string(),
                    etag,
                }
                .into(),
            )
            .await?;

        Ok(result.deleted.unwrap_or(false))
    }

    /// Applies a compiled patch.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if the document does not exist and
    /// `ignore_missing` is false.
    pub async fn patch(&self, command: PatchCommand, ignore_missing: bool) -> DocumentStoreResult<BatchResult> {
        let key = command.key().to_string();
        let result = self.execute(command.into()).await?;

        check_patch_result(key, result, ignore_missing)
    }

    /// Applies a scripted patch.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if the document does not exist and
    /// `ignore_missing` is false.
    pub async fn scripted_patch(
        &self,
        command: ScriptedPatchCommand,
        ignore_missing: bool,
    ) -> DocumentStoreResult<BatchResult> {
        let key = command.key().to_string();
        let result = self.execute(command.into()).await?;

        check_patch_result(key, result, ignore_missing)
    }

    /// Stores a whole document under `key`, tagging it with the type's tag name.
    #[instrument(skip(self, document))]
    pub async fn store<T: Document>(
        &self,
        key: &str,
        document: &T,
        etag: Option<Etag>,
    ) -> DocumentStoreResult<DocumentMetadata> {
        require_key(key)?;

        let document = self.conventions.serializer().to_value(document)?;

        if document.is_null() {
            return Err(DocumentStoreError::ArgumentNull("document"));
        }

        let mut metadata = Map::new();
        metadata.insert(
            ENTITY_NAME.to_string(),
            Value::String(self.conventions.find_type_tag_name::<T>()),
        );

        let result = self
            .execute(
                PutCommand {
                    key: key.to_string(),
                    etag,
                    document,
                    metadata,
                }
                .into(),
            )
            .await?;

        Ok(result.document_metadata())
    }
}

fn require_key(key: &str) -> DocumentStoreResult<()> {
    if key.is_empty() {
        return Err(DocumentStoreError::ArgumentNull("key"));
    }

    Ok(())
}

fn check_patch_result(key: String, result: BatchResult, ignore_missing: bool) -> DocumentStoreResult<BatchResult> {
    match result.patch_result {
        Some(PatchResult::DocumentDoesNotExist) if !ignore_missing => {
            Err(DocumentStoreError::DocumentNotFound(key))
        }
        _ => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;

    use crate::{
        command::CommandMethod,
        conventions::JsonSerializer,
        metadata::JsonDocumentMetadata,
        patch::DocumentPatch,
        schema::{FieldKind, FieldSchema, Schema},
        script::ScriptedPatch,
        selector::Selector,
    };

    #[derive(Debug, Default)]
    struct RecordingBackend {
        batches: Mutex<Vec<Vec<Command>>>,
        existing: Vec<String>,
        extra_result: bool,
    }

    impl RecordingBackend {
        fn with_existing(keys: &[&str]) -> Self {
            Self {
                existing: keys.iter().map(|key| key.to_string()).collect(),
                ..Self::default()
            }
        }

        fn recorded(&self) -> Vec<Vec<Command>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn batch(&self, commands: Vec<Command>) -> DocumentStoreResult<Vec<BatchResult>> {
            let mut results: Vec<BatchResult> = commands
                .iter()
                .map(|command| {
                    let exists = self.existing.iter().any(|key| key == command.key());
                    BatchResult {
                        method: command.method(),
                        key: command.key().to_string(),
                        etag: Some(Etag::from("e-2")),
                        metadata: None,
                        patch_result: match command.method() {
                            CommandMethod::Patch | CommandMethod::Eval if exists => Some(PatchResult::Patched),
                            CommandMethod::Patch | CommandMethod::Eval => Some(PatchResult::DocumentDoesNotExist),
                            _ => None,
                        },
                        deleted: (command.method() == CommandMethod::Delete).then_some(exists),
                    }
                })
                .collect();

            if self.extra_result {
                results.push(results[0].clone());
            }

            self.batches.lock().unwrap().push(commands);

            Ok(results)
        }

        async fn head(&self, key: &str) -> DocumentStoreResult<Option<JsonDocumentMetadata>> {
            Ok(self.existing.iter().any(|existing| existing == key).then(|| descriptor(key)))
        }

        async fn get_metadata(&self, keys: Vec<String>) -> DocumentStoreResult<Vec<JsonDocumentMetadata>> {
            Ok(keys
                .iter()
                .filter(|key| self.existing.contains(key))
                .map(|key| descriptor(key))
                .collect())
        }
    }

    fn descriptor(key: &str) -> JsonDocumentMetadata {
        JsonDocumentMetadata {
            key: key.to_string(),
            etag: Some(Etag::from("e-1")),
            last_modified: None,
            non_authoritative_information: None,
            metadata: Map::new(),
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Post {
        title: String,
        subtitle: Option<String>,
    }

    impl Document for Post {
        fn type_name() -> &'static str {
            "Post"
        }
    }

    impl Schema for Post {
        fn fields() -> &'static [FieldSchema] {
            const FIELDS: &[FieldSchema] = &[
                FieldSchema::new("title", "title", FieldKind::Value),
                FieldSchema::new("subtitle", "subtitle", FieldKind::Value),
            ];
            FIELDS
        }
    }

    #[tokio::test]
    async fn test_store_writes_tagged_put() {
        let backend = RecordingBackend::default();
        let conventions = Conventions::default();
        let commands = StoreCommands::new(&backend, &conventions);

        let post = Post {
            title: "Hello".to_string(),
            subtitle: None,
        };
        let metadata = commands.store("posts/1", &post, None).await.unwrap();

        assert_eq!(metadata.etag(), Some(&Etag::from("e-2")));

        let recorded = backend.recorded();
        match &recorded[0][0] {
            Command::Put(put) => {
                assert_eq!(put.document, json!({"title": "Hello"}));
                assert_eq!(put.metadata.get(ENTITY_NAME), Some(&json!("Posts")));
            }
            other => panic!("expected a put, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_patch_of_missing_document() {
        let backend = RecordingBackend::default();
        let conventions = Conventions::default();
        let commands = StoreCommands::new(&backend, &conventions);

        let mut patch = DocumentPatch::<Post>::new("posts/404", JsonSerializer::default()).unwrap();
        patch.set(&Selector::parse("|p| p.title").unwrap(), "x").unwrap();

        let result = commands.patch(patch.build(), false).await;
        assert!(matches!(result, Err(DocumentStoreError::DocumentNotFound(key)) if key == "posts/404"));

        let result = commands.patch(patch.build(), true).await.unwrap();
        assert_eq!(result.patch_result, Some(PatchResult::DocumentDoesNotExist));
    }

    #[tokio::test]
    async fn test_scripted_patch_of_existing_document() {
        let backend = RecordingBackend::with_existing(&["posts/1"]);
        let conventions = Conventions::default();
        let commands = StoreCommands::new(&backend, &conventions);

        let command = ScriptedPatch::new("posts/1", conventions.serializer().clone())
            .unwrap()
            .script("this.Views++;")
            .unwrap()
            .build();
        let result = commands.scripted_patch(command, false).await.unwrap();

        assert_eq!(result.method, CommandMethod::Eval);
        assert_eq!(result.patch_result, Some(PatchResult::Patched));
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let backend = RecordingBackend::with_existing(&["posts/1"]);
        let conventions = Conventions::default();
        let commands = StoreCommands::new(&backend, &conventions);

        assert!(commands.exists("posts/1").await.unwrap());
        assert!(!commands.exists("posts/2").await.unwrap());
        assert!(commands.delete("posts/1", None).await.unwrap());
        assert!(!commands.delete("posts/2", Some(Etag::from("e-1"))).await.unwrap());
        assert!(matches!(
            commands.delete("", None).await,
            Err(DocumentStoreError::ArgumentNull("key"))
        ));
    }

    #[tokio::test]
    async fn test_load_metadata_many_deduplicates_keys() {
        let backend = RecordingBackend::with_existing(&["posts/1", "posts/2"]);
        let conventions = Conventions::default();
        let commands = StoreCommands::new(&backend, &conventions);

        let metadata = commands
            .load_metadata_many(["posts/2", "posts/1", "posts/2", "posts/3"])
            .await
            .unwrap();
        let keys: Vec<_> = metadata.iter().filter_map(DocumentMetadata::key).collect();

        assert_eq!(keys, vec!["posts/2", "posts/1"]);
        assert!(commands.load_metadata_many(Vec::<String>::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_requires_exactly_one_result() {
        let backend = RecordingBackend {
            extra_result: true,
            ..RecordingBackend::default()
        };
        let conventions = Conventions::default();
        let commands = StoreCommands::new(&backend, &conventions);

        let result = commands
            .execute(
                DeleteCommand {
                    key: "posts/1".to_string(),
                    etag: None,
                }
                .into(),
            )
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
    }
}
