//! In-memory storage implementation for document stores.
//!
//! Documents are kept as JSON objects in a HashMap behind an async-safe read-write lock.
//! Keys are matched case-insensitively; the key a document was stored under is kept in its
//! metadata.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mea::rwlock::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use docpatch_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    command::{BatchResult, Command, CommandMethod, DeleteCommand, Etag, PatchResult, PutCommand},
    error::{DocumentStoreError, DocumentStoreResult},
    metadata::{ETAG, JsonDocumentMetadata, KEY, RAVEN_LAST_MODIFIED},
    patch::PatchCommand,
};

use crate::patcher::DocumentPatcher;

type DocumentMap = HashMap<String, StoredDocument>;

#[derive(Debug, Clone)]
struct StoredDocument {
    key: String,
    data: Map<String, Value>,
    metadata: Map<String, Value>,
    etag: Etag,
    last_modified: DateTime<Utc>,
}

impl StoredDocument {
    fn new(key: String, data: Map<String, Value>, metadata: Map<String, Value>) -> Self {
        Self {
            key,
            data,
            metadata,
            etag: new_etag(),
            last_modified: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.etag = new_etag();
        self.last_modified = Utc::now();
    }

    /// Metadata as reported to clients, including key, etag, and modification time.
    fn reported_metadata(&self) -> Map<String, Value> {
        let mut metadata = self.metadata.clone();

        metadata.insert(KEY.to_string(), Value::String(self.key.clone()));
        metadata.insert(ETAG.to_string(), Value::String(self.etag.to_string()));
        metadata.insert(
            RAVEN_LAST_MODIFIED.to_string(),
            Value::String(self.last_modified.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );

        metadata
    }

    fn descriptor(&self) -> JsonDocumentMetadata {
        JsonDocumentMetadata {
            key: self.key.clone(),
            etag: Some(self.etag.clone()),
            last_modified: Some(self.last_modified.fixed_offset()),
            non_authoritative_information: Some(false),
            metadata: self.reported_metadata(),
        }
    }
}

/// A thread-safe in-memory store backend.
///
/// A batch is all or nothing: documents touched by a failing batch are restored to their
/// state before the batch. Cloning the store yields another handle to the same documents.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    documents: Arc<RwLock<DocumentMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(DocumentMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns a copy of the stored document body, if present.
    pub async fn document(&self, key: &str) -> Option<Value> {
        self.documents
            .read()
            .await
            .get(&normalize_key(key))
            .map(|stored| Value::Object(stored.data.clone()))
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn batch(&self, commands: Vec<Command>) -> DocumentStoreResult<Vec<BatchResult>> {
        let mut documents = self.documents.write().await;
        let mut undo = UndoLog::default();

        match apply_batch(&mut documents, &commands, &mut undo) {
            Ok(results) => {
                tracing::debug!(commands = commands.len(), "Committed in-memory batch");

                Ok(results)
            }
            Err(err) => {
                tracing::debug!(restored = undo.len(), error = %err, "Rolled back in-memory batch");
                undo.rollback(&mut documents);

                Err(err)
            }
        }
    }

    async fn head(&self, key: &str) -> DocumentStoreResult<Option<JsonDocumentMetadata>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&normalize_key(key))
            .map(StoredDocument::descriptor))
    }

    async fn get_metadata(&self, keys: Vec<String>) -> DocumentStoreResult<Vec<JsonDocumentMetadata>> {
        let documents = self.documents.read().await;

        Ok(keys
            .iter()
            .filter_map(|key| documents.get(&normalize_key(key)))
            .map(StoredDocument::descriptor)
            .collect())
    }
}

/// Originals of the documents a batch touched, restored if the batch fails.
#[derive(Default)]
struct UndoLog {
    originals: HashMap<String, Option<StoredDocument>>,
}

impl UndoLog {
    /// Records the current state of `key` unless it was already recorded in this batch.
    fn record(&mut self, documents: &DocumentMap, key: &str) {
        if !self.originals.contains_key(key) {
            self.originals.insert(key.to_string(), documents.get(key).cloned());
        }
    }

    fn len(&self) -> usize {
        self.originals.len()
    }

    fn rollback(self, documents: &mut DocumentMap) {
        for (key, original) in self.originals {
            match original {
                Some(stored) => {
                    documents.insert(key, stored);
                }
                None => {
                    documents.remove(&key);
                }
            }
        }
    }
}

fn apply_batch(
    documents: &mut DocumentMap,
    commands: &[Command],
    undo: &mut UndoLog,
) -> DocumentStoreResult<Vec<BatchResult>> {
    let mut results = Vec::with_capacity(commands.len());

    for command in commands {
        undo.record(documents, &normalize_key(command.key()));

        let result = match command {
            Command::Put(put) => apply_put(documents, put)?,
            Command::Delete(delete) => apply_delete(documents, delete)?,
            Command::Patch(patch) => apply_patch(documents, patch)?,
            Command::ScriptedPatch(scripted) => {
                return Err(DocumentStoreError::Backend(format!(
                    "scripted patches are not supported by the in-memory store (document {})",
                    scripted.key()
                )));
            }
        };

        results.push(result);
    }

    Ok(results)
}

fn new_etag() -> Etag {
    Etag::new(Uuid::new_v4().to_string())
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

fn check_etag(key: &str, expected: Option<&Etag>, stored: Option<&StoredDocument>) -> DocumentStoreResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match stored {
        Some(stored) if &stored.etag == expected => Ok(()),
        stored => {
            tracing::warn!(key, expected = %expected, "Etag mismatch");

            Err(DocumentStoreError::Concurrency {
                key: key.to_string(),
                reason: match stored {
                    Some(stored) => format!("expected etag {expected}, current etag is {}", stored.etag),
                    None => format!("expected etag {expected}, but the document does not exist"),
                },
            })
        }
    }
}

fn apply_put(documents: &mut DocumentMap, put: &PutCommand) -> DocumentStoreResult<BatchResult> {
    let normalized = normalize_key(&put.key);
    check_etag(&put.key, put.etag.as_ref(), documents.get(&normalized))?;

    let data = match &put.document {
        Value::Object(data) => data.clone(),
        other => {
            return Err(DocumentStoreError::Backend(format!(
                "document {} must be a JSON object, got `{other}`",
                put.key
            )));
        }
    };

    let stored = StoredDocument::new(put.key.clone(), data, put.metadata.clone());

    let result = BatchResult {
        method: CommandMethod::Put,
        key: put.key.clone(),
        etag: Some(stored.etag.clone()),
        metadata: Some(stored.reported_metadata()),
        patch_result: None,
        deleted: None,
    };

    documents.insert(normalized, stored);

    Ok(result)
}

fn apply_delete(documents: &mut DocumentMap, delete: &DeleteCommand) -> DocumentStoreResult<BatchResult> {
    let normalized = normalize_key(&delete.key);
    check_etag(&delete.key, delete.etag.as_ref(), documents.get(&normalized))?;

    let deleted = documents.remove(&normalized).is_some();

    Ok(BatchResult {
        method: CommandMethod::Delete,
        key: delete.key.clone(),
        etag: None,
        metadata: None,
        patch_result: None,
        deleted: Some(deleted),
    })
}

fn apply_patch(documents: &mut DocumentMap, patch: &PatchCommand) -> DocumentStoreResult<BatchResult> {
    let normalized = normalize_key(patch.key());

    let Some(stored) = documents.get_mut(&normalized) else {
        return Ok(BatchResult {
            method: CommandMethod::Patch,
            key: patch.key().to_string(),
            etag: None,
            metadata: None,
            patch_result: Some(PatchResult::DocumentDoesNotExist),
            deleted: None,
        });
    };

    check_etag(patch.key(), patch.etag(), Some(&*stored))?;

    let modified = DocumentPatcher::new(patch.key(), &mut stored.data).apply_all(patch.patches())?;

    if modified {
        stored.touch();
    }

    Ok(BatchResult {
        method: CommandMethod::Patch,
        key: stored.key.clone(),
        etag: Some(stored.etag.clone()),
        metadata: Some(stored.reported_metadata()),
        patch_result: Some(if modified {
            PatchResult::Patched
        } else {
            PatchResult::NotModified
        }),
        deleted: None,
    })
}

/// Builder for [`InMemoryStore`].
///
/// # Example
///
/// ```ignore
/// use docpatch::backend::StoreBackendBuilder;
/// use docpatch::memory::InMemoryStoreBuilder;
///
/// let backend = InMemoryStoreBuilder::default().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpatch_core::{
        conventions::JsonSerializer,
        metadata::DocumentMetadata,
        patch::{PatchLeaf, PatchNode},
        script::ScriptedPatch,
    };
    use serde_json::json;

    fn put(key: &str, document: Value, etag: Option<Etag>) -> Command {
        PutCommand {
            key: key.to_string(),
            etag,
            document,
            metadata: Map::new(),
        }
        .into()
    }

    fn set(name: &str, value: Value) -> PatchNode {
        PatchNode::leaf(name, PatchLeaf::Set { value, prev_val: None })
    }

    fn set_command(key: &str, name: &str, value: Value) -> Command {
        PatchCommand::new(key, vec![set(name, value)], None).unwrap().into()
    }

    async fn seeded() -> (InMemoryStore, Etag) {
        let store = InMemoryStore::new();
        let results = store
            .batch(vec![put("Posts/1", json!({"Title": "Hello", "Views": 1}), None)])
            .await
            .unwrap();
        let etag = results[0].etag.clone().unwrap();

        (store, etag)
    }

    #[tokio::test]
    async fn test_put_reports_metadata() {
        let (store, etag) = seeded().await;

        let descriptor = store.head("posts/1").await.unwrap().unwrap();
        let metadata = DocumentMetadata::from_descriptor(&descriptor);

        assert_eq!(metadata.key(), Some("Posts/1"));
        assert_eq!(metadata.etag(), Some(&etag));
        assert!(metadata.last_modified().is_some());
        assert_eq!(DocumentMetadata::from_raw(&descriptor.metadata), metadata);
    }

    #[tokio::test]
    async fn test_patch_refreshes_etag() {
        let (store, etag) = seeded().await;
        let command = PatchCommand::new("posts/1", vec![set("Views", json!(2))], Some(etag.clone())).unwrap();

        let results = store.batch(vec![command.into()]).await.unwrap();

        assert_eq!(results[0].patch_result, Some(PatchResult::Patched));
        assert_ne!(results[0].etag.as_ref(), Some(&etag));
        assert_eq!(store.document("posts/1").await, Some(json!({"Title": "Hello", "Views": 2})));
    }

    #[tokio::test]
    async fn test_patch_without_changes_keeps_etag() {
        let (store, etag) = seeded().await;
        let command = PatchCommand::new("posts/1", vec![set("Views", json!(1))], None).unwrap();

        let results = store.batch(vec![command.into()]).await.unwrap();

        assert_eq!(results[0].patch_result, Some(PatchResult::NotModified));
        assert_eq!(results[0].etag.as_ref(), Some(&etag));
    }

    #[tokio::test]
    async fn test_patch_of_missing_document() {
        let store = InMemoryStore::new();
        let command = PatchCommand::new("posts/9", vec![set("Views", json!(2))], None).unwrap();

        let results = store.batch(vec![command.into()]).await.unwrap();

        assert_eq!(results[0].patch_result, Some(PatchResult::DocumentDoesNotExist));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_stale_etag_is_a_conflict() {
        let (store, _) = seeded().await;

        let result = store
            .batch(vec![put("posts/1", json!({"Title": "Other"}), Some(Etag::from("stale")))])
            .await;
        assert!(matches!(result, Err(DocumentStoreError::Concurrency { .. })));

        let result = store
            .batch(vec![
                DeleteCommand {
                    key: "posts/2".to_string(),
                    etag: Some(Etag::from("stale")),
                }
                .into(),
            ])
            .await;
        assert!(matches!(result, Err(DocumentStoreError::Concurrency { .. })));
    }

    #[tokio::test]
    async fn test_failed_batch_is_not_applied() {
        let (store, _) = seeded().await;
        let failing = PatchCommand::new(
            "posts/1",
            vec![PatchNode::leaf("Title", PatchLeaf::Add { value: json!("x") })],
            None,
        )
        .unwrap();

        let result = store
            .batch(vec![put("posts/2", json!({"Title": "Second"}), None), failing.into()])
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
        assert_eq!(store.len().await, 1);
        assert!(store.head("posts/2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_restores_touched_documents() {
        let (store, etag) = seeded().await;
        let failing = PatchCommand::new(
            "posts/1",
            vec![set("Views", json!(7)), PatchNode::leaf("Title", PatchLeaf::Add { value: json!("x") })],
            None,
        )
        .unwrap();

        let result = store
            .batch(vec![
                set_command("posts/1", "Title", json!("Changed")),
                DeleteCommand { key: "posts/1".to_string(), etag: None }.into(),
                put("posts/1", json!({"Title": "Again"}), None),
                failing.into(),
            ])
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
        assert_eq!(store.document("posts/1").await, Some(json!({"Title": "Hello", "Views": 1})));
        assert_eq!(store.head("posts/1").await.unwrap().unwrap().etag, Some(etag));
    }

    #[tokio::test]
    async fn test_unset_under_missing_parent_refreshes_etag() {
        let store = InMemoryStore::new();
        let results = store
            .batch(vec![put("posts/1", json!({"Title": "x"}), None)])
            .await
            .unwrap();
        let etag = results[0].etag.clone().unwrap();

        let unset = PatchNode::modify("Meta", PatchNode::leaf("Links", PatchLeaf::Unset { prev_val: None }));
        let command = PatchCommand::new("posts/1", vec![unset], None).unwrap();
        let results = store.batch(vec![command.into()]).await.unwrap();

        assert_eq!(results[0].patch_result, Some(PatchResult::Patched));
        assert_ne!(results[0].etag.as_ref(), Some(&etag));
        assert_eq!(store.document("posts/1").await, Some(json!({"Title": "x", "Meta": {}})));
    }

    #[tokio::test]
    async fn test_delete_and_metadata_lookup() {
        let (store, _) = seeded().await;
        store
            .batch(vec![put("posts/2", json!({"Title": "Second"}), None)])
            .await
            .unwrap();

        let found = store
            .get_metadata(vec!["posts/2".to_string(), "posts/3".to_string(), "POSTS/1".to_string()])
            .await
            .unwrap();
        let keys: Vec<_> = found.iter().map(|descriptor| descriptor.key.as_str()).collect();
        assert_eq!(keys, vec!["posts/2", "Posts/1"]);

        let results = store
            .batch(vec![
                DeleteCommand { key: "posts/1".to_string(), etag: None }.into(),
                DeleteCommand { key: "posts/1".to_string(), etag: None }.into(),
            ])
            .await
            .unwrap();
        assert_eq!(results[0].deleted, Some(true));
        assert_eq!(results[1].deleted, Some(false));
    }

    #[tokio::test]
    async fn test_scripted_patches_are_unsupported() {
        let (store, _) = seeded().await;
        let command = ScriptedPatch::new("posts/1", JsonSerializer::new())
            .unwrap()
            .script("this.Views++;")
            .unwrap()
            .build();

        let result = store.batch(vec![command.into()]).await;

        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_builder() {
        let store = InMemoryStore::builder().build().await.unwrap();

        assert!(store.is_empty().await);
    }
}
