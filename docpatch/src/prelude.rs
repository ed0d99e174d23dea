//! Convenient re-exports of commonly used types from docpatch.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docpatch::prelude::*;
//! ```
//!
//! The prelude also brings `docpatch_core` into scope, which the `Schema` and `Document`
//! derives refer to.

pub use docpatch_core;

pub use docpatch_core::{
    select,
    backend::{StoreBackend, StoreBackendBuilder},
    command::{BatchResult, Command, Etag, PatchResult},
    commands::StoreCommands,
    config::{FailoverBehavior, StoreOptions},
    conventions::{Conventions, JsonSerializer},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    metadata::DocumentMetadata,
    patch::{DocumentPatch, PatchCommand, PatchNode, PatchOperationKind},
    schema::Schema,
    script::{ScriptedPatch, ScriptedPatchCommand},
    selector::{PropertyPath, Selector},
    store::DocumentStore,
};
pub use docpatch_macros::{Document, Schema};
