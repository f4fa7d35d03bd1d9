//! Attribute documents and their content identity.
//!
//! A [`Document`] is one immutable set of attribute values for a slice or a
//! run: a JSON object, arbitrarily nested. Two documents are equal when they
//! are structurally deep-equal; key order never matters. Content identity
//! for deduplication is the BLAKE3 hash of the canonical JSON rendering:
//!
//! - Compact: no whitespace between tokens.
//! - Object keys sorted lexicographically (recursive at every depth).
//! - Arrays preserve element order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One immutable attribute document.
///
/// Wraps a JSON object. Equality is structural and key-order independent;
/// there is no identity beyond content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// The empty document (no attributes).
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a document from a JSON value.
    ///
    /// Returns `None` if the value is not an object — attribute documents
    /// are always keyed.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Borrow the underlying key/value map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    /// Look up one attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert or replace one attribute value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// `true` if the document carries no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of top-level attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Render the canonical JSON string: compact, keys sorted at every
    /// nesting level. The same logical document always produces the same
    /// byte sequence.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        let mut buf = String::new();
        write_canonical(&Value::Object(self.0.clone()), &mut buf);
        buf
    }

    /// Content hash in `blake3:<hex>` form, computed over the canonical
    /// JSON rendering. This is the deduplication identity.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let hash = blake3::hash(self.canonical_json().as_bytes());
        format!("blake3:{hash}")
    }

    /// Consume the document, returning the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Object(doc.0)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_json())
    }
}

fn write_canonical(value: &Value, buf: &mut String) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => buf.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json's string escaping for correctness
            buf.push_str(&serde_json::to_string(s).expect("string serialization cannot fail"));
        }
        Value::Array(arr) => {
            buf.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            buf.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(
                    &serde_json::to_string(key).expect("string serialization cannot fail"),
                );
                buf.push(':');
                if let Some(val) = map.get(*key) {
                    write_canonical(val, buf);
                }
            }
            buf.push('}');
        }
    }
}
