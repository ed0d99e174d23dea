//! Naming conventions and serializer settings shared by a document store.
//!
//! Every document type has a *type tag name*, the logical collection name used to group
//! documents of the same kind. The tag name is either the type's explicit collection
//! override or its pluralized type name. A lowercase, hyphen-segmented *document key
//! prefix* is derived from the tag name once per type:
//!
//! ```ignore
//! use docpatch::conventions::transform_type_tag_name_to_document_key_prefix;
//!
//! assert_eq!(transform_type_tag_name_to_document_key_prefix("BlogPosts"), "blog-posts");
//! ```

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use serde::Serialize;
use serde_json::Value;

use crate::{config::{FailoverBehavior, StoreOptions}, document::Document, error::DocumentStoreResult};

/// Derives a document key prefix from a type tag name.
///
/// The input is scanned once, left to right. Every upper-case character is lowered, and a
/// hyphen is inserted before it when it is not the first character and the character
/// originally preceding it was lower-case. Runs of upper-case letters are therefore not
/// split, and a lower-case run following an upper-case run gets no hyphen:
///
/// ```ignore
/// assert_eq!(transform_type_tag_name_to_document_key_prefix("BlogPost"), "blog-post");
/// assert_eq!(transform_type_tag_name_to_document_key_prefix("RSSFeed"), "rssfeed");
/// assert_eq!(transform_type_tag_name_to_document_key_prefix("ABCfoo"), "abcfoo");
/// ```
///
/// Existing key prefixes depend on this exact output, including for acronym-heavy names.
pub fn transform_type_tag_name_to_document_key_prefix(name: &str) -> String {
    let mut prefix = String::with_capacity(name.len() + name.len() / 2);
    let mut previous: Option<char> = None;

    for (position, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if position != 0 && previous.is_some_and(char::is_lowercase) {
                prefix.push('-');
            }

            prefix.extend(ch.to_lowercase());
        } else {
            prefix.push(ch);
        }

        previous = Some(ch);
    }

    prefix
}

/// Default type tag name: the pluralized type name.
pub fn default_type_tag_name(type_name: &str) -> String {
    let lower = type_name.to_ascii_lowercase();

    if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &type_name[..type_name.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        format!("{type_name}es")
    } else {
        format!("{type_name}s")
    }
}

/// Converts typed values into generic JSON values using the store's settings.
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    ignore_null_values: bool,
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self {
            ignore_null_values: true,
        }
    }
}

impl JsonSerializer {
    /// Creates a serializer with default settings (null object members are dropped).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether object members with a `null` value are dropped.
    pub fn ignore_null_values(mut self, ignore: bool) -> Self {
        self.ignore_null_values = ignore;
        self
    }

    /// Serializes a value into its JSON representation.
    ///
    /// A top-level `null` is returned as is; only object members are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`](crate::error::DocumentStoreError::Serialization)
    /// if the value cannot be represented as JSON.
    pub fn to_value<V>(&self, value: &V) -> DocumentStoreResult<Value>
    where
        V: Serialize + ?Sized,
    {
        let mut value = serde_json::to_value(value)?;

        if self.ignore_null_values {
            strip_null_members(&mut value);
        }

        Ok(value)
    }
}

fn strip_null_members(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, member| !member.is_null());
            map.values_mut().for_each(strip_null_members);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_null_members),
        _ => {}
    }
}

/// Store-wide conventions: tag names, key prefixes, key generation, and serialization.
///
/// Clones share the key prefix cache.
#[derive(Clone)]
pub struct Conventions {
    serializer: JsonSerializer,
    failover_behavior: FailoverBehavior,
    identity_parts_separator: String,
    transform_key_prefix: fn(&str) -> String,
    prefixes: Arc<Mutex<HashMap<TypeId, String>>>,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            serializer: JsonSerializer::default(),
            failover_behavior: FailoverBehavior::default(),
            identity_parts_separator: "/".to_string(),
            transform_key_prefix: transform_type_tag_name_to_document_key_prefix,
            prefixes: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl fmt::Debug for Conventions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conventions")
            .field("serializer", &self.serializer)
            .field("failover_behavior", &self.failover_behavior)
            .field("identity_parts_separator", &self.identity_parts_separator)
            .finish_non_exhaustive()
    }
}

impl Conventions {
    /// Creates the default conventions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates conventions from parsed store options.
    pub fn from_options(options: &StoreOptions) -> Self {
        Self::default().with_failover_behavior(options.failover_behavior())
    }

    /// Replaces the serializer.
    pub fn with_serializer(mut self, serializer: JsonSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Sets the failover behavior reported to the store.
    pub fn with_failover_behavior(mut self, behavior: FailoverBehavior) -> Self {
        self.failover_behavior = behavior;
        self
    }

    /// Sets the separator between a key prefix and a document identity.
    pub fn with_identity_parts_separator(mut self, separator: impl Into<String>) -> Self {
        self.identity_parts_separator = separator.into();
        self
    }

    /// Replaces the tag-name-to-key-prefix hook and clears cached prefixes.
    pub fn with_key_prefix_transform(mut self, transform: fn(&str) -> String) -> Self {
        self.transform_key_prefix = transform;
        self.prefixes = Arc::new(Mutex::new(HashMap::new()));
        self
    }

    /// The serializer used for typed patch values and stored documents.
    pub fn serializer(&self) -> &JsonSerializer {
        &self.serializer
    }

    /// The configured failover behavior.
    pub fn failover_behavior(&self) -> FailoverBehavior {
        self.failover_behavior
    }

    /// Finds the type tag name of a document type.
    ///
    /// The `#[document(collection = "...")]` override wins; otherwise the type name is
    /// pluralized.
    pub fn find_type_tag_name<T: Document>(&self) -> String {
        match T::collection_name() {
            Some(collection) => collection.to_string(),
            None => default_type_tag_name(T::type_name()),
        }
    }

    /// Returns the document key prefix of a document type.
    ///
    /// The key prefix hook runs once per type; later calls hit the cache.
    pub fn document_key_prefix<T: Document>(&self) -> String {
        let type_id = TypeId::of::<T>();
        let mut prefixes = self
            .prefixes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        prefixes
            .entry(type_id)
            .or_insert_with(|| {
                let tag_name = self.find_type_tag_name::<T>();
                let prefix = (self.transform_key_prefix)(&tag_name);

                tracing::debug!(type_name = T::type_name(), %tag_name, %prefix, "Registered document key prefix");

                prefix
            })
            .clone()
    }

    /// Builds a document key from the type's key prefix and an identity.
    pub fn generate_document_key<T: Document>(&self, identity: impl fmt::Display) -> String {
        format!(
            "{}{}{}",
            self.document_key_prefix::<T>(),
            self.identity_parts_separator,
            identity
        )
    }
}
