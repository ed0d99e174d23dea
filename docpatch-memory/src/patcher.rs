//! Patch application for in-memory documents.
//!
//! [`DocumentPatcher`] walks one patch chain over a JSON object, descending through
//! `Modify` nodes and applying the leaf operation with its previous-value check.

use serde_json::{Map, Value};

use docpatch_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    patch::{PatchNode, PatchVisitor},
};

/// Applies patch chains to one stored JSON object.
///
/// Each visit returns whether the object changed.
pub(crate) struct DocumentPatcher<'a> {
    key: &'a str,
    target: &'a mut Map<String, Value>,
}

impl<'a> DocumentPatcher<'a> {
    pub fn new(key: &'a str, target: &'a mut Map<String, Value>) -> Self {
        Self { key, target }
    }

    /// Applies every chain in order, returning whether any of them changed the object.
    pub fn apply_all(&mut self, patches: &[PatchNode]) -> DocumentStoreResult<bool> {
        let mut modified = false;

        for patch in patches {
            modified |= self.visit_node(patch)?;
        }

        Ok(modified)
    }

    fn check_prev_val(&self, name: &str, prev_val: Option<&Value>) -> DocumentStoreResult<()> {
        let Some(expected) = prev_val else {
            return Ok(());
        };

        match self.target.get(name) {
            Some(current) if current == expected => Ok(()),
            current => {
                tracing::warn!(key = self.key, field = name, "Previous value check failed");

                Err(DocumentStoreError::Concurrency {
                    key: self.key.to_string(),
                    reason: format!(
                        "field `{name}` expected {expected}, found {}",
                        current.map_or_else(|| "nothing".to_string(), Value::to_string)
                    ),
                })
            }
        }
    }
}

impl PatchVisitor for DocumentPatcher<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_add(&mut self, name: &str, value: &Value) -> Result<Self::Output, Self::Error> {
        match self.target.get_mut(name) {
            Some(Value::Array(items)) => items.push(value.clone()),
            None | Some(Value::Null) => {
                self.target
                    .insert(name.to_string(), Value::Array(vec![value.clone()]));
            }
            Some(_) => {
                return Err(DocumentStoreError::Backend(format!(
                    "cannot add to field `{name}` of document {}: not an array",
                    self.key
                )));
            }
        }

        Ok(true)
    }

    fn visit_set(
        &mut self,
        name: &str,
        value: &Value,
        prev_val: Option<&Value>,
    ) -> Result<Self::Output, Self::Error> {
        self.check_prev_val(name, prev_val)?;

        let previous = self.target.insert(name.to_string(), value.clone());

        Ok(previous.as_ref() != Some(value))
    }

    fn visit_unset(
        &mut self,
        name: &str,
        prev_val: Option<&Value>,
    ) -> Result<Self::Output, Self::Error> {
        self.check_prev_val(name, prev_val)?;

        Ok(self.target.remove(name).is_some())
    }

    fn visit_modify(
        &mut self,
        name: &str,
        nested: &PatchNode,
    ) -> Result<Self::Output, Self::Error> {
        let entry = self
            .target
            .entry(name.to_string())
            .or_insert(Value::Null);

        // A missing intermediate object is created on the way down and counts as a change.
        let created = entry.is_null();
        if created {
            *entry = Value::Object(Map::new());
        }

        match entry {
            Value::Object(object) => {
                let modified = DocumentPatcher::new(self.key, object).visit_node(nested)?;

                Ok(modified || created)
            }
            _ => Err(DocumentStoreError::Backend(format!(
                "cannot modify field `{name}` of document {}: not an object",
                self.key
            ))),
        }
    }
}
