//! Tree-shaped patch commands.
//!
//! A patch mutates individual fields of a stored document without sending the whole
//! document. Each operation addresses one field through a [`PropertyPath`]; nested paths
//! become a chain of `Modify` nodes that descend one level each, ending in the leaf
//! operation:
//!
//! ```text
//! set(|p| p.author.address.city, "Oslo")
//!
//! Modify "author"
//!   └─ Modify "address"
//!        └─ Set "city" = "Oslo"
//! ```
//!
//! [`DocumentPatch`] accumulates such chains for one document and packages them into an
//! immutable [`PatchCommand`]:
//!
//! ```ignore
//! let command = store
//!     .patch::<BlogPost>("blog-posts/1")?
//!     .set(&select!(BlogPost, |p| p.title)?, "Hello")?
//!     .add(&select!(BlogPost, |p| p.tags)?, "rust")?
//!     .unset(&select!(BlogPost, |p| p.draft)?)?
//!     .build();
//! ```

use std::marker::PhantomData;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{
    command::Etag,
    conventions::JsonSerializer,
    error::{DocumentStoreError, DocumentStoreResult},
    schema::Schema,
    selector::{PropertyPath, Selector},
};

/// The kind of a patch node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PatchOperationKind {
    /// Append a value to a collection field.
    Add,
    /// Assign a field, optionally asserting its previous value.
    Set,
    /// Remove a field, optionally asserting its previous value.
    Unset,
    /// Descend into a nested object field.
    Modify,
}

/// The leaf operation of a patch chain.
///
/// A `prev_val` makes the store apply the operation only if the currently stored value
/// equals it; `None` means unconditional.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchLeaf {
    Add {
        value: Value,
    },
    Set {
        value: Value,
        prev_val: Option<Value>,
    },
    Unset {
        prev_val: Option<Value>,
    },
}

impl PatchLeaf {
    pub fn kind(&self) -> PatchOperationKind {
        match self {
            PatchLeaf::Add { .. } => PatchOperationKind::Add,
            PatchLeaf::Set { .. } => PatchOperationKind::Set,
            PatchLeaf::Unset { .. } => PatchOperationKind::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PatchOp {
    Leaf(PatchLeaf),
    Modify(Box<PatchNode>),
}

/// One node of a patch chain.
///
/// `Modify` nodes carry exactly one nested node and no values; leaf nodes carry no nested
/// node. Both hold by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchNode {
    name: String,
    op: PatchOp,
}

impl PatchNode {
    /// Creates a leaf node.
    pub fn leaf(name: impl Into<String>, leaf: PatchLeaf) -> Self {
        Self {
            name: name.into(),
            op: PatchOp::Leaf(leaf),
        }
    }

    /// Creates a `Modify` node descending into `name`.
    pub fn modify(name: impl Into<String>, nested: PatchNode) -> Self {
        Self {
            name: name.into(),
            op: PatchOp::Modify(Box::new(nested)),
        }
    }

    /// The field this node addresses.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PatchOperationKind {
        match &self.op {
            PatchOp::Leaf(leaf) => leaf.kind(),
            PatchOp::Modify(_) => PatchOperationKind::Modify,
        }
    }

    /// The value carried by `Add` and `Set` nodes.
    pub fn value(&self) -> Option<&Value> {
        match &self.op {
            PatchOp::Leaf(PatchLeaf::Add { value } | PatchLeaf::Set { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// The asserted previous value of `Set` and `Unset` nodes.
    pub fn prev_val(&self) -> Option<&Value> {
        match &self.op {
            PatchOp::Leaf(PatchLeaf::Set { prev_val, .. } | PatchLeaf::Unset { prev_val }) => {
                prev_val.as_ref()
            }
            _ => None,
        }
    }

    /// The nested node of a `Modify` node.
    pub fn nested(&self) -> Option<&PatchNode> {
        match &self.op {
            PatchOp::Modify(nested) => Some(nested),
            PatchOp::Leaf(_) => None,
        }
    }

    /// Number of nodes in the chain starting at this node.
    pub fn depth(&self) -> usize {
        1 + self.nested().map_or(0, PatchNode::depth)
    }
}

impl Serialize for PatchNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Wire<'a> {
            #[serde(rename = "Type")]
            kind: PatchOperationKind,
            name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            value: Option<&'a Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            prev_val: Option<&'a Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            nested: Option<[&'a PatchNode; 1]>,
        }

        Wire {
            kind: self.kind(),
            name: &self.name,
            value: self.value(),
            prev_val: self.prev_val(),
            nested: self.nested().map(|nested| [nested]),
        }
        .serialize(serializer)
    }
}

/// Builds the patch chain for `path` ending in `leaf`.
///
/// A single-name path yields one leaf node. Longer paths yield one `Modify` node per
/// parent name, each owning exactly one nested node, with the leaf operation last.
pub fn build_patch_tree(path: &PropertyPath, leaf: PatchLeaf) -> PatchNode {
    let mut node = PatchNode::leaf(path.leaf(), leaf);

    for name in path.iter().rev().skip(1) {
        node = PatchNode::modify(name, node);
    }

    node
}

/// Visitor over a patch chain, used by backends that apply patches themselves.
pub trait PatchVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_add(&mut self, name: &str, value: &Value) -> Result<Self::Output, Self::Error>;
    fn visit_set(
        &mut self,
        name: &str,
        value: &Value,
        prev_val: Option<&Value>,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_unset(
        &mut self,
        name: &str,
        prev_val: Option<&Value>,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_modify(
        &mut self,
        name: &str,
        nested: &PatchNode,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_node(&mut self, node: &PatchNode) -> Result<Self::Output, Self::Error> {
        match &node.op {
            PatchOp::Leaf(PatchLeaf::Add { value }) => self.visit_add(&node.name, value),
            PatchOp::Leaf(PatchLeaf::Set { value, prev_val }) => {
                self.visit_set(&node.name, value, prev_val.as_ref())
            }
            PatchOp::Leaf(PatchLeaf::Unset { prev_val }) => {
                self.visit_unset(&node.name, prev_val.as_ref())
            }
            PatchOp::Modify(nested) => self.visit_modify(&node.name, nested),
        }
    }
}

/// An immutable patch command for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatchCommand {
    key: String,
    etag: Option<Etag>,
    patches: Vec<PatchNode>,
}

impl PatchCommand {
    /// Creates a patch command from already-built nodes.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`] if `key` is empty.
    pub fn new(
        key: impl Into<String>,
        patches: Vec<PatchNode>,
        etag: Option<Etag>,
    ) -> DocumentStoreResult<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(DocumentStoreError::ArgumentNull("key"));
        }

        Ok(Self { key, etag, patches })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn etag(&self) -> Option<&Etag> {
        self.etag.as_ref()
    }

    /// Root nodes in the order they were added.
    pub fn patches(&self) -> &[PatchNode] {
        &self.patches
    }
}

/// Accumulates patch operations for one document of type `T`.
///
/// Every operation resolves its selector and validates its arguments before touching the
/// accumulated list, so a failed call leaves the builder unchanged. The builder is not
/// synchronized; use one per call sequence.
#[derive(Debug)]
pub struct DocumentPatch<T> {
    key: String,
    serializer: JsonSerializer,
    patches: Vec<PatchNode>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Schema> DocumentPatch<T> {
    /// Creates a patch builder for the document with the given key.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`] if `key` is empty.
    pub fn new(key: impl Into<String>, serializer: JsonSerializer) -> DocumentStoreResult<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(DocumentStoreError::ArgumentNull("key"));
        }

        Ok(Self {
            key,
            serializer,
            patches: Vec::new(),
            _marker: PhantomData,
        })
    }

    /// The key of the patched document.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of accumulated operations.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Appends `value` to the collection field selected by `selector`.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::ArgumentNull`] if `value` serializes to `null`
    /// - [`DocumentStoreError::InvalidSelector`] if the selector is invalid or its leaf is not
    ///   a collection
    /// - [`DocumentStoreError::Serialization`] if `value` cannot be serialized
    pub fn add<V>(&mut self, selector: &Selector<T>, value: &V) -> DocumentStoreResult<&mut Self>
    where
        V: Serialize + ?Sized,
    {
        let value = self.serializer.to_value(value)?;
        self.add_value(selector, value)
    }

    /// Appends an already-serialized value to the collection field selected by `selector`.
    pub fn add_value(
        &mut self,
        selector: &Selector<T>,
        value: Value,
    ) -> DocumentStoreResult<&mut Self> {
        let value = require_value("value", value)?;
        let resolved = selector.resolve()?;

        if !resolved.leaf.is_collection() {
            return Err(DocumentStoreError::InvalidSelector {
                selector: selector.source().to_string(),
                reason: format!("`{}` is not a collection field", resolved.leaf.ident()),
            });
        }

        Ok(self.push(build_patch_tree(&resolved.path, PatchLeaf::Add { value })))
    }

    /// Assigns `value` to the field selected by `selector`.
    pub fn set<V>(&mut self, selector: &Selector<T>, value: &V) -> DocumentStoreResult<&mut Self>
    where
        V: Serialize + ?Sized,
    {
        let value = self.serializer.to_value(value)?;
        self.set_value(selector, value, None)
    }

    /// Assigns `value` only if the stored value currently equals `prev_val`.
    pub fn set_if<V, P>(
        &mut self,
        selector: &Selector<T>,
        value: &V,
        prev_val: &P,
    ) -> DocumentStoreResult<&mut Self>
    where
        V: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let value = self.serializer.to_value(value)?;
        let prev_val = self.serializer.to_value(prev_val)?;
        self.set_value(selector, value, optional_value(prev_val))
    }

    /// Assigns an already-serialized value, optionally asserting the previous value.
    pub fn set_value(
        &mut self,
        selector: &Selector<T>,
        value: Value,
        prev_val: Option<Value>,
    ) -> DocumentStoreResult<&mut Self> {
        let value = require_value("value", value)?;
        let resolved = selector.resolve()?;

        Ok(self.push(build_patch_tree(
            &resolved.path,
            PatchLeaf::Set { value, prev_val },
        )))
    }

    /// Removes the field selected by `selector`.
    pub fn unset(&mut self, selector: &Selector<T>) -> DocumentStoreResult<&mut Self> {
        self.unset_value(selector, None)
    }

    /// Removes the field only if the stored value currently equals `prev_val`.
    pub fn unset_if<P>(&mut self, selector: &Selector<T>, prev_val: &P) -> DocumentStoreResult<&mut Self>
    where
        P: Serialize + ?Sized,
    {
        let prev_val = self.serializer.to_value(prev_val)?;
        self.unset_value(selector, optional_value(prev_val))
    }

    /// Removes the field, optionally asserting an already-serialized previous value.
    pub fn unset_value(
        &mut self,
        selector: &Selector<T>,
        prev_val: Option<Value>,
    ) -> DocumentStoreResult<&mut Self> {
        let resolved = selector.resolve()?;

        Ok(self.push(build_patch_tree(&resolved.path, PatchLeaf::Unset { prev_val })))
    }

    /// Snapshots the accumulated operations into a command without a concurrency token.
    pub fn build(&self) -> PatchCommand {
        self.snapshot(None)
    }

    /// Snapshots the accumulated operations into a command conditioned on `etag`.
    pub fn build_with_etag(&self, etag: Etag) -> PatchCommand {
        self.snapshot(Some(etag))
    }

    fn snapshot(&self, etag: Option<Etag>) -> PatchCommand {
        tracing::debug!(key = %self.key, operations = self.patches.len(), etag = ?etag, "Built patch command");

        PatchCommand {
            key: self.key.clone(),
            etag,
            patches: self.patches.clone(),
        }
    }

    fn push(&mut self, node: PatchNode) -> &mut Self {
        tracing::trace!(key = %self.key, field = node.name(), kind = ?node.kind(), depth = node.depth(), "Appended patch operation");

        self.patches.push(node);
        self
    }
}

fn require_value(argument: &'static str, value: Value) -> DocumentStoreResult<Value> {
    match value {
        Value::Null => Err(DocumentStoreError::ArgumentNull(argument)),
        value => Ok(value),
    }
}

fn optional_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        value => Some(value),
    }
}
