//! In-memory document storage backend for docpatch.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It applies patch commands itself, which makes it the reference for how a store is
//! expected to interpret them, and is ideal for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Atomic batches** - A batch either applies completely or not at all
//! - **Optimistic concurrency** - Etag and previous-value checks on every write
//!
//! # Quick Start
//!
//! ```ignore
//! use docpatch::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!
//!     store.commands().store("blog-posts/1", &post, None).await?;
//!
//!     let mut patch = store.patch::<BlogPost>("blog-posts/1")?;
//!     patch.set(&select!(BlogPost, |p| p.title)?, "Updated")?;
//!     store.commands().patch(patch.build(), false).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod patcher;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
