//! Scripted patches: a server-executed script plus named parameters.
//!
//! Scripted patches bypass selectors and patch trees entirely. The builder is staged so a
//! script must be given before parameters:
//!
//! ```ignore
//! let command = store
//!     .script("blog-posts/1")?
//!     .script("this.Views += views;")?
//!     .parameters([("views", 1)])?
//!     .build();
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    command::Etag,
    conventions::JsonSerializer,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// An immutable scripted patch command for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptedPatchCommand {
    key: String,
    etag: Option<Etag>,
    #[serde(rename = "Patch")]
    request: ScriptedPatchRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScriptedPatchRequest {
    script: String,
    values: Map<String, Value>,
}

impl ScriptedPatchCommand {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn etag(&self) -> Option<&Etag> {
        self.etag.as_ref()
    }

    pub fn script(&self) -> &str {
        &self.request.script
    }

    /// Named script parameters.
    pub fn values(&self) -> &Map<String, Value> {
        &self.request.values
    }
}

/// Entry point of a scripted patch for one document.
#[derive(Debug, Clone)]
pub struct ScriptedPatch {
    key: String,
    serializer: JsonSerializer,
}

impl ScriptedPatch {
    /// Starts a scripted patch for the document with the given key.
    ///
    /// Parameter values are converted with `serializer`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`] if `key` is empty.
    pub fn new(key: impl Into<String>, serializer: JsonSerializer) -> DocumentStoreResult<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(DocumentStoreError::ArgumentNull("key"));
        }

        Ok(Self { key, serializer })
    }

    /// Sets the script to run.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`] if `script` is empty.
    pub fn script(self, script: impl Into<String>) -> DocumentStoreResult<ScriptedPatchWithScript> {
        let script = script.into();

        if script.trim().is_empty() {
            return Err(DocumentStoreError::ArgumentNull("script"));
        }

        Ok(ScriptedPatchWithScript {
            key: self.key,
            serializer: self.serializer,
            script,
        })
    }
}

/// A scripted patch with its script but no parameters yet.
#[derive(Debug, Clone)]
pub struct ScriptedPatchWithScript {
    key: String,
    serializer: JsonSerializer,
    script: String,
}

impl ScriptedPatchWithScript {
    /// Supplies parameters as name/value pairs.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::DuplicateParameter`] if a name appears more than once
    /// - [`DocumentStoreError::Serialization`] if a value cannot be represented as JSON
    pub fn parameters<I, K, V>(self, parameters: I) -> DocumentStoreResult<ScriptedPatchWithParameters>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let mut values = Map::new();

        for (name, value) in parameters {
            let name = name.into();

            if values.contains_key(&name) {
                return Err(DocumentStoreError::DuplicateParameter(name));
            }

            let value = self.serializer.to_value(&value)?;
            values.insert(name, value);
        }

        Ok(self.with_values(values))
    }

    /// Supplies parameters from the direct fields of a serializable value.
    ///
    /// Only the first level is flattened; nested objects are passed as object values.
    /// Members dropped by the serializer settings are not passed.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::ArgumentNull`] if `parameters` serializes to `null`
    /// - [`DocumentStoreError::Serialization`] if it does not serialize to an object
    pub fn parameters_from<P>(self, parameters: &P) -> DocumentStoreResult<ScriptedPatchWithParameters>
    where
        P: Serialize + ?Sized,
    {
        let values = match self.serializer.to_value(parameters)? {
            Value::Object(values) => values,
            Value::Null => return Err(DocumentStoreError::ArgumentNull("parameters")),
            other => {
                return Err(DocumentStoreError::Serialization(format!(
                    "scripted patch parameters must be an object with named fields, got `{other}`"
                )));
            }
        };

        Ok(self.with_values(values))
    }

    pub fn build(&self) -> ScriptedPatchCommand {
        build_command(&self.key, &self.script, Map::new(), None)
    }

    pub fn build_with_etag(&self, etag: Etag) -> ScriptedPatchCommand {
        build_command(&self.key, &self.script, Map::new(), Some(etag))
    }

    fn with_values(self, values: Map<String, Value>) -> ScriptedPatchWithParameters {
        ScriptedPatchWithParameters {
            key: self.key,
            script: self.script,
            values,
        }
    }
}

/// A scripted patch with script and parameters.
#[derive(Debug, Clone)]
pub struct ScriptedPatchWithParameters {
    key: String,
    script: String,
    values: Map<String, Value>,
}

impl ScriptedPatchWithParameters {
    pub fn build(&self) -> ScriptedPatchCommand {
        build_command(&self.key, &self.script, self.values.clone(), None)
    }

    pub fn build_with_etag(&self, etag: Etag) -> ScriptedPatchCommand {
        build_command(&self.key, &self.script, self.values.clone(), Some(etag))
    }
}

fn build_command(
    key: &str,
    script: &str,
    values: Map<String, Value>,
    etag: Option<Etag>,
) -> ScriptedPatchCommand {
    tracing::debug!(key, parameters = values.len(), etag = ?etag, "Built scripted patch command");

    ScriptedPatchCommand {
        key: key.to_string(),
        etag,
        request: ScriptedPatchRequest {
            script: script.to_string(),
            values,
        },
    }
}
