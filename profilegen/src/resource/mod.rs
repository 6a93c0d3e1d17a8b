//! Parsed conformance resources.
//!
//! A [`Resource`] is a JSON object carrying a `resourceType`. Resources are
//! parsed from raw archive members, unwrapped when they are bundles, and
//! queried with [`FieldPath`] expressions.
//!
//! # Identity
//!
//! Definition contexts key resources by [`Resource::identity`]: the canonical
//! `url` when the resource has one, otherwise `ResourceType/id`.

mod path;

pub use path::{FieldPath, FieldPathParseError, FieldPathSegment};

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Resource type of composite containers.
pub const BUNDLE_TYPE: &str = "Bundle";

/// Resource type of profile definitions.
pub const STRUCTURE_DEFINITION_TYPE: &str = "StructureDefinition";

/// Errors raised while parsing or querying resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The payload is not a JSON resource.
    #[error("malformed resource: {0}")]
    Parse(String),

    /// A path expression did not resolve to a scalar.
    #[error("path '{path}' did not resolve to a value")]
    Lookup { path: String },
}

impl From<serde_json::Error> for ResourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// A single parsed resource document.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    value: Value,
}

impl Resource {
    /// Parse raw JSON bytes.
    ///
    /// The document must be an object with a non-empty string
    /// `resourceType`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ResourceError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Wrap an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ResourceError> {
        if !value.is_object() {
            return Err(ResourceError::Parse("resource is not a JSON object".into()));
        }

        match value.get("resourceType").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => Ok(Self { value }),
            _ => Err(ResourceError::Parse("missing resourceType".into())),
        }
    }

    pub fn resource_type(&self) -> &str {
        self.string_field("resourceType").unwrap_or_default()
    }

    pub fn id(&self) -> Option<&str> {
        self.string_field("id")
    }

    /// Canonical URL of the resource, if it declares one.
    pub fn url(&self) -> Option<&str> {
        self.string_field("url")
    }

    pub fn name(&self) -> Option<&str> {
        self.string_field("name")
    }

    /// Key used to store this resource in a definition context.
    pub fn identity(&self) -> Option<String> {
        if let Some(url) = self.url() {
            return Some(url.to_string());
        }
        self.id()
            .map(|id| format!("{}/{}", self.resource_type(), id))
    }

    pub fn is_bundle(&self) -> bool {
        self.resource_type() == BUNDLE_TYPE
    }

    /// Resources contained in a bundle's `entry[*].resource`, in order.
    ///
    /// Entries that are not valid resources are skipped. Returns an empty
    /// vector for non-bundles.
    pub fn bundle_entries(&self) -> Vec<Resource> {
        if !self.is_bundle() {
            return Vec::new();
        }

        self.value
            .get("entry")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("resource"))
                    .filter_map(|resource| Resource::from_value(resource.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evaluate `path` and return the first scalar it resolves to.
    ///
    /// Numbers and booleans are rendered with their JSON representation.
    pub fn extract(&self, path: &FieldPath) -> Result<String, ResourceError> {
        path.evaluate(&self.value)
            .into_iter()
            .find_map(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .ok_or_else(|| ResourceError::Lookup {
                path: path.to_string(),
            })
    }

    /// Look up a raw top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            Some(identity) => write!(f, "{} {}", self.resource_type(), identity),
            None => write!(f, "{} (anonymous)", self.resource_type()),
        }
    }
}
