//! Core traits for document types stored as whole JSON documents.
//!
//! Patches address documents through a [`Schema`](crate::schema::Schema); storing or
//! naming whole documents additionally needs a [`Document`], which carries the type name
//! the conventions derive tag names and key prefixes from.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::error::DocumentStoreResult;

/// Core trait that all documents stored in a document store must implement.
///
/// Usually derived with `#[derive(Document)]`, which reads the Rust type name and an
/// optional `#[document(collection = "...")]` override.
///
/// # Example
///
/// ```ignore
/// use docpatch::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// pub struct BlogPost {
///     pub title: String,
/// }
///
/// // Tag name "BlogPosts", key prefix "blog-posts"
/// let key = conventions.generate_document_key::<BlogPost>(1);
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The unqualified Rust type name.
    fn type_name() -> &'static str;

    /// An explicit type tag name overriding the default pluralized type name.
    fn collection_name() -> Option<&'static str> {
        None
    }
}

/// Extension trait providing JSON conversion for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    use crate::error::DocumentStoreError;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Feed {
        url: String,
    }

    impl Document for Feed {
        fn type_name() -> &'static str {
            "Feed"
        }
    }

    #[test]
    fn test_json_conversion() {
        let feed = Feed { url: "https://example.com/rss".to_string() };
        let value = feed.to_json().unwrap();

        assert_eq!(value, json!({"url": "https://example.com/rss"}));
        assert_eq!(Feed::from_json(value).unwrap(), feed);
        assert!(Feed::collection_name().is_none());
    }

    #[test]
    fn test_from_json_rejects_wrong_shape() {
        let result = Feed::from_json(json!({"link": 1}));

        assert!(matches!(result, Err(DocumentStoreError::Serialization(_))));
    }
}
