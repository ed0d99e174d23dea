//! Addressable field descriptions for patchable types.
//!
//! Selectors are validated against a [`Schema`] so that every name in a resolved
//! property path refers to a real data field of the enclosing type. Schemas are
//! normally generated with `#[derive(Schema)]`:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, Schema)]
//! #[serde(rename_all = "PascalCase")]
//! pub struct BlogPost {
//!     pub title: String,
//!     #[schema(nested)]
//!     pub author: Author,
//!     pub tags: Vec<String>,
//!     #[serde(skip)]
//!     pub cached: Option<String>,
//! }
//! ```
//!
//! Field attributes understood by the derive:
//!
//! - `#[schema(nested)]` - the field is itself a `Schema` type and can be descended into
//!   (an `Option<_>` or `Box<_>` wrapper is looked through)
//! - `#[schema(collection)]` - the field is a collection even if its type is not a recognised one
//! - `#[schema(rename = "...")]` / `#[serde(rename = "...")]` - stored field name
//! - `#[schema(skip)]` / `#[serde(skip)]` - the field is not addressable

/// The shape of a single addressable field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A scalar or opaque value. Can be set or unset but not descended into.
    Value,
    /// A collection value. Valid target for `Add`.
    Collection,
    /// A nested object with its own schema.
    Object(fn() -> &'static [FieldSchema]),
}

/// Description of one field of a [`Schema`] type.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    ident: &'static str,
    name: &'static str,
    kind: FieldKind,
}

impl FieldSchema {
    /// Creates a field description.
    ///
    /// `ident` is the Rust field name used in selectors, `name` is the stored field name
    /// emitted in patch commands.
    pub const fn new(ident: &'static str, name: &'static str, kind: FieldKind) -> Self {
        Self { ident, name, kind }
    }

    /// The Rust identifier of the field.
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// The stored field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field's shape.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns `true` if the field can be the target of an `Add` operation.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, FieldKind::Collection)
    }

    /// Returns the nested schema when the field is an object.
    pub fn nested(&self) -> Option<&'static [FieldSchema]> {
        match self.kind {
            FieldKind::Object(fields) => Some(fields()),
            _ => None,
        }
    }
}

/// A type whose fields can be addressed by selectors.
pub trait Schema {
    /// Returns the addressable fields of this type.
    fn fields() -> &'static [FieldSchema];

    /// Looks up a field by its Rust identifier.
    fn field(ident: &str) -> Option<&'static FieldSchema> {
        find_field(Self::fields(), ident)
    }
}

pub(crate) fn find_field(
    fields: &'static [FieldSchema],
    ident: &str,
) -> Option<&'static FieldSchema> {
    fields.iter().find(|field| field.ident == ident)
}
