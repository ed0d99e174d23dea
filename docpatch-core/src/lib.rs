//! A typed patch-command compiler for JSON document stores.
//!
//! This crate is the core of the docpatch project and provides:
//!
//! - **Selectors** ([`selector`]) - Typed field-access expressions resolved into property paths
//! - **Schemas** ([`schema`]) - Addressable field descriptions, usually derived with `#[derive(Schema)]`
//! - **Patches** ([`patch`]) - Tree-shaped patch nodes and the per-document patch assembler
//! - **Scripted patches** ([`script`]) - Script plus named-parameter commands
//! - **Commands** ([`command`]) - The dispatchable command set and per-command batch results
//! - **Conventions** ([`conventions`]) - Type tag names, document key prefixes, and serializer settings
//! - **Metadata** ([`metadata`]) - Read-only projection of store-reported document metadata
//! - **Store backend abstraction** ([`backend`]) - The external store collaborator
//! - **Document store** ([`store`]) - Explicit store handle tying a backend to its conventions
//! - **Configuration** ([`config`]) - Connection string parsing
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docpatch::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Schema, Document)]
//! pub struct BlogPost {
//!     pub title: String,
//!     #[schema(nested)]
//!     pub author: Author,
//!     pub tags: Vec<String>,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Schema)]
//! pub struct Author {
//!     pub name: String,
//! }
//!
//! let command = DocumentPatch::<BlogPost>::new("blog-posts/1", JsonSerializer::default())?
//!     .set(&select!(BlogPost, |p| p.author.name)?, "Alice")?
//!     .add(&select!(BlogPost, |p| p.tags)?, "rust")?
//!     .build();
//! ```

#[allow(unused_extern_crates)]
extern crate self as docpatch_core;

pub mod backend;
pub mod command;
pub mod commands;
pub mod config;
pub mod conventions;
pub mod document;
pub mod error;
pub mod metadata;
pub mod patch;
pub mod schema;
pub mod script;
pub mod selector;
pub mod store;
