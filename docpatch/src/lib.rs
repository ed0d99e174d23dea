//! Main docpatch crate: typed patch commands for JSON document stores.
//!
//! This crate is the primary entry point for users of docpatch. It re-exports the core
//! types, the derive macros, and the bundled in-memory backend.
//!
//! # Features
//!
//! - **Typed selectors** - Field-access expressions checked against a derived schema
//! - **Patch commands** - Set, unset, and add operations compiled into nested patch trees
//! - **Scripted patches** - Server-side scripts with named parameters
//! - **Conventions** - Type tag names, document key prefixes, and serializer settings
//!
//! # Quick Start
//!
//! ```ignore
//! use docpatch::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Schema, Document)]
//! #[serde(rename_all = "PascalCase")]
//! pub struct BlogPost {
//!     pub title: String,
//!     #[schema(nested)]
//!     pub author: Author,
//!     pub tags: Vec<String>,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Schema)]
//! #[serde(rename_all = "PascalCase")]
//! pub struct Author {
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let key = store.conventions().generate_document_key::<BlogPost>(1);
//!
//!     store.commands().store(&key, &post, None).await?;
//!
//!     let mut patch = store.patch::<BlogPost>(&key)?;
//!     patch
//!         .set(&select!(BlogPost, |p| p.author.name)?, "Alice")?
//!         .add(&select!(BlogPost, |p| p.tags)?, "rust")?;
//!
//!     // {"Key":"blog-posts/1","Etag":null,"Patches":[{"Type":"Modify","Name":"Author",...}]}
//!     store.commands().patch(patch.build(), false).await?;
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Scripted patches
//!
//! ```ignore
//! let command = store
//!     .script(&key)?
//!     .script("this.Views += views;")?
//!     .parameters([("views", 1)])?
//!     .build();
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing (`memory` feature, on by
//!   default)

pub mod prelude;

pub use docpatch_core::{
    backend, command, commands, config, conventions, document, error, metadata, patch, schema,
    script, select, selector, store,
};
pub use docpatch_macros::{Document, Schema};

// Re-export JSON types for convenience
pub use serde_json;

/// In-memory storage backend implementations.
#[cfg(feature = "memory")]
pub mod memory {
    pub use docpatch_memory::{InMemoryStore, InMemoryStoreBuilder};
}
