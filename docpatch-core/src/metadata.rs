//! Read-only projection of store-reported document metadata.
//!
//! The store reports metadata either as a raw JSON object (batch results, loaded documents)
//! or as a previously fetched [`JsonDocumentMetadata`] descriptor (`HEAD`-style lookups).
//! All constructors of [`DocumentMetadata`] read the same fields the same way.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::Etag;

/// Raw metadata key holding the document key.
pub const KEY: &str = "@id";
/// Raw metadata key holding the concurrency token.
pub const ETAG: &str = "@etag";
/// Raw metadata key holding the store's last-modified timestamp.
pub const RAVEN_LAST_MODIFIED: &str = "Raven-Last-Modified";
/// Fallback raw metadata key for the last-modified timestamp.
pub const LAST_MODIFIED: &str = "Last-Modified";
/// Raw metadata key flagging a possibly stale read.
pub const NON_AUTHORITATIVE_INFORMATION: &str = "Non-Authoritative-Information";
/// Raw metadata key holding the type tag name of a stored document.
pub const ENTITY_NAME: &str = "Raven-Entity-Name";

/// A metadata descriptor as returned by a metadata-only lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDocumentMetadata {
    pub key: String,
    pub etag: Option<Etag>,
    pub last_modified: Option<DateTime<FixedOffset>>,
    pub non_authoritative_information: Option<bool>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Store-reported metadata of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    key: Option<String>,
    etag: Option<Etag>,
    last_modified: Option<DateTime<FixedOffset>>,
    non_authoritative_information: bool,
}

impl DocumentMetadata {
    /// Reads metadata from a raw metadata object.
    pub fn from_raw(metadata: &Map<String, Value>) -> Self {
        let etag = metadata
            .get(ETAG)
            .and_then(Value::as_str)
            .map(Etag::new);

        Self::read_raw(etag, metadata)
    }

    /// Reads metadata from an optional raw metadata object and an explicit token.
    ///
    /// A token embedded in the raw metadata takes precedence over `etag`.
    pub fn from_raw_with_etag(etag: Option<Etag>, metadata: Option<&Map<String, Value>>) -> Self {
        match metadata {
            Some(metadata) => {
                let mut projected = Self::from_raw(metadata);

                if projected.etag.is_none() {
                    projected.etag = etag;
                }

                projected
            }
            None => Self {
                etag,
                ..Self::default()
            },
        }
    }

    /// Reads metadata from a previously fetched descriptor.
    pub fn from_descriptor(descriptor: &JsonDocumentMetadata) -> Self {
        Self {
            key: Some(descriptor.key.clone()),
            etag: descriptor.etag.clone(),
            last_modified: descriptor.last_modified,
            non_authoritative_information: descriptor
                .non_authoritative_information
                .unwrap_or(false),
        }
    }

    fn read_raw(etag: Option<Etag>, metadata: &Map<String, Value>) -> Self {
        let last_modified = metadata
            .get(RAVEN_LAST_MODIFIED)
            .and_then(parse_timestamp)
            .or_else(|| metadata.get(LAST_MODIFIED).and_then(parse_timestamp));

        let non_authoritative_information = match metadata.get(NON_AUTHORITATIVE_INFORMATION) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self {
            key: metadata.get(KEY).and_then(Value::as_str).map(str::to_string),
            etag,
            last_modified,
            non_authoritative_information,
        }
    }

    /// The document key.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The concurrency token of the reported version.
    pub fn etag(&self) -> Option<&Etag> {
        self.etag.as_ref()
    }

    /// When the document was last modified.
    pub fn last_modified(&self) -> Option<DateTime<FixedOffset>> {
        self.last_modified
    }

    /// Whether the store flagged the read as possibly stale.
    pub fn non_authoritative_information(&self) -> bool {
        self.non_authoritative_information
    }
}

impl From<&JsonDocumentMetadata> for DocumentMetadata {
    fn from(descriptor: &JsonDocumentMetadata) -> Self {
        Self::from_descriptor(descriptor)
    }
}

impl From<&Map<String, Value>> for DocumentMetadata {
    fn from(metadata: &Map<String, Value>) -> Self {
        Self::from_raw(metadata)
    }
}

/// Parses the timestamp formats stores put in metadata: RFC 3339, RFC 2822 (HTTP
/// `Last-Modified`), and offset-less ISO 8601 which is taken as UTC.
fn parse_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    let text = value.as_str()?;

    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
        .or_else(|| {
            tracing::debug!(timestamp = text, "Ignoring unparseable metadata timestamp");
            None
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_from_raw_reads_all_fields() {
        let metadata = DocumentMetadata::from_raw(&raw(json!({
            "@id": "blog-posts/1",
            "@etag": "01000000-0000-0001-0000-000000000002",
            "Raven-Last-Modified": "2016-03-01T10:20:30.1234567",
            "Non-Authoritative-Information": true,
        })));

        assert_eq!(metadata.key(), Some("blog-posts/1"));
        assert_eq!(
            metadata.etag().map(Etag::as_str),
            Some("01000000-0000-0001-0000-000000000002")
        );
        assert_eq!(
            metadata.last_modified().map(|at| at.timestamp()),
            Some(Utc.with_ymd_and_hms(2016, 3, 1, 10, 20, 30).unwrap().timestamp())
        );
        assert!(metadata.non_authoritative_information());
    }

    #[test]
    fn test_from_raw_falls_back_to_http_last_modified() {
        let metadata = DocumentMetadata::from_raw(&raw(json!({
            "Last-Modified": "Tue, 01 Mar 2016 10:20:30 GMT",
        })));

        assert_eq!(
            metadata.last_modified().map(|at| at.timestamp()),
            Some(Utc.with_ymd_and_hms(2016, 3, 1, 10, 20, 30).unwrap().timestamp())
        );
        assert!(metadata.key().is_none());
        assert!(!metadata.non_authoritative_information());
    }

    #[test]
    fn test_embedded_etag_wins_over_explicit_token() {
        let with_embedded = raw(json!({"@id": "a/1", "@etag": "embedded"}));
        let without_embedded = raw(json!({"@id": "a/1"}));

        let metadata = DocumentMetadata::from_raw_with_etag(Some(Etag::from("explicit")), Some(&with_embedded));
        assert_eq!(metadata.etag(), Some(&Etag::from("embedded")));

        let metadata = DocumentMetadata::from_raw_with_etag(Some(Etag::from("explicit")), Some(&without_embedded));
        assert_eq!(metadata.etag(), Some(&Etag::from("explicit")));

        let metadata = DocumentMetadata::from_raw_with_etag(Some(Etag::from("explicit")), None);
        assert_eq!(metadata.etag(), Some(&Etag::from("explicit")));
        assert!(metadata.key().is_none());
    }

    #[test]
    fn test_constructors_converge() {
        let modified = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap().fixed_offset();
        let map = raw(json!({
            "@id": "users/9",
            "@etag": "e-9",
            "Raven-Last-Modified": modified.to_rfc3339(),
            "Non-Authoritative-Information": "True",
        }));
        let descriptor = JsonDocumentMetadata {
            key: "users/9".to_string(),
            etag: Some(Etag::from("e-9")),
            last_modified: Some(modified),
            non_authoritative_information: Some(true),
            metadata: map.clone(),
        };

        let from_raw = DocumentMetadata::from_raw(&map);
        let from_override = DocumentMetadata::from_raw_with_etag(None, Some(&map));
        let from_descriptor = DocumentMetadata::from(&descriptor);

        assert_eq!(from_raw, from_override);
        assert_eq!(from_raw, from_descriptor);
    }
}
