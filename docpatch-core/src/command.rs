//! The dispatchable command set and per-command batch results.
//!
//! Commands are immutable values handed to [`StoreBackend::batch`](crate::backend::StoreBackend::batch).
//! Each command targets one document key and may carry a concurrency token ([`Etag`]); the
//! store rejects the command if the stored document's token differs.
//!
//! Commands serialize to the store's batch wire shape:
//!
//! ```json
//! { "Method": "PATCH", "Key": "blog-posts/1", "Etag": null, "Patches": [ ... ] }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    metadata::DocumentMetadata,
    patch::PatchCommand,
    script::ScriptedPatchCommand,
};

/// An opaque concurrency token identifying a stored document version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Etag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Etag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The batch method of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandMethod {
    Put,
    Patch,
    Eval,
    Delete,
}

/// Deletes a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteCommand {
    pub key: String,
    pub etag: Option<Etag>,
}

/// Stores a whole document, replacing any previous version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutCommand {
    pub key: String,
    pub etag: Option<Etag>,
    pub document: Value,
    pub metadata: Map<String, Value>,
}

/// A command directed at one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Patch(PatchCommand),
    ScriptedPatch(ScriptedPatchCommand),
    Delete(DeleteCommand),
    Put(PutCommand),
}

impl Command {
    /// The key of the targeted document.
    pub fn key(&self) -> &str {
        match self {
            Command::Patch(command) => command.key(),
            Command::ScriptedPatch(command) => command.key(),
            Command::Delete(command) => &command.key,
            Command::Put(command) => &command.key,
        }
    }

    /// The concurrency token the command is conditioned on.
    pub fn etag(&self) -> Option<&Etag> {
        match self {
            Command::Patch(command) => command.etag(),
            Command::ScriptedPatch(command) => command.etag(),
            Command::Delete(command) => command.etag.as_ref(),
            Command::Put(command) => command.etag.as_ref(),
        }
    }

    /// The batch method of the command.
    pub fn method(&self) -> CommandMethod {
        match self {
            Command::Patch(_) => CommandMethod::Patch,
            Command::ScriptedPatch(_) => CommandMethod::Eval,
            Command::Delete(_) => CommandMethod::Delete,
            Command::Put(_) => CommandMethod::Put,
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Wire<'a, C: Serialize> {
            method: CommandMethod,
            #[serde(flatten)]
            command: &'a C,
        }

        let method = self.method();

        match self {
            Command::Patch(command) => Wire { method, command }.serialize(serializer),
            Command::ScriptedPatch(command) => Wire { method, command }.serialize(serializer),
            Command::Delete(command) => Wire { method, command }.serialize(serializer),
            Command::Put(command) => Wire { method, command }.serialize(serializer),
        }
    }
}

impl From<PatchCommand> for Command {
    fn from(command: PatchCommand) -> Self {
        Command::Patch(command)
    }
}

impl From<ScriptedPatchCommand> for Command {
    fn from(command: ScriptedPatchCommand) -> Self {
        Command::ScriptedPatch(command)
    }
}

impl From<DeleteCommand> for Command {
    fn from(command: DeleteCommand) -> Self {
        Command::Delete(command)
    }
}

impl From<PutCommand> for Command {
    fn from(command: PutCommand) -> Self {
        Command::Put(command)
    }
}

/// Outcome of a patch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchResult {
    /// The target document does not exist.
    DocumentDoesNotExist,
    /// The patch was applied.
    Patched,
    /// The patch was evaluated without being applied.
    Tested,
    /// The patch was skipped by the store.
    Skipped,
    /// The patch was applied but changed nothing.
    NotModified,
}

/// Result of one command in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchResult {
    pub method: CommandMethod,
    pub key: String,
    #[serde(default)]
    pub etag: Option<Etag>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub patch_result: Option<PatchResult>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

impl BatchResult {
    /// Projects the reported metadata, with the result's etag as fallback token.
    pub fn document_metadata(&self) -> DocumentMetadata {
        DocumentMetadata::from_raw_with_etag(self.etag.clone(), self.metadata.as_ref())
    }
}
