//! Submission field values
//!
//! A field holds a plain string, an ordered multi-value, a discrete
//! (duplicate-free) multi-value or a reference to an uploaded file.
//! The serde representation is the tagged `{type, value}` transport form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Outbound field map handed to a dispatcher
pub type OutboundFields = BTreeMap<String, Value>;

/// Reference to an uploaded file. File content is never carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub file_name: String,
    pub public_url: String,
    pub relative_path: String,
    pub mime_type: String,
}

/// One submission field value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    String(String),
    Multi(Vec<FieldValue>),
    DiscreteMulti(Vec<FieldValue>),
    File(FileReference),
}

impl FieldValue {
    /// Build a discrete multi-value, dropping repeated items
    pub fn discrete_multi(items: impl IntoIterator<Item = FieldValue>) -> Self {
        let mut unique: Vec<FieldValue> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Self::DiscreteMulti(unique)
    }

    /// Build an ordered multi-value
    pub fn multi(items: impl IntoIterator<Item = FieldValue>) -> Self {
        Self::Multi(items.into_iter().collect())
    }

    /// Empty string or empty collection
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Multi(items) | Self::DiscreteMulti(items) => items.is_empty(),
            Self::File(_) => false,
        }
    }

    /// String content of a scalar value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON form used for dispatching (no type tags)
    pub fn to_plain(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Multi(items) | Self::DiscreteMulti(items) => {
                Value::Array(items.iter().map(FieldValue::to_plain).collect())
            }
            Self::File(file) => {
                let mut map = Map::new();
                map.insert("fileName".into(), file.file_name.clone().into());
                map.insert("publicUrl".into(), file.public_url.clone().into());
                map.insert("relativePath".into(), file.relative_path.clone().into());
                map.insert("mimeType".into(), file.mime_type.clone().into());
                Value::Object(map)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Multi(items) | Self::DiscreteMulti(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(","))
            }
            Self::File(file) => f.write_str(&file.public_url),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<FileReference> for FieldValue {
    fn from(file: FileReference) -> Self {
        Self::File(file)
    }
}

/// Submission field map, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Data(BTreeMap<String, FieldValue>);

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Flatten into the plain field map a dispatcher receives
    pub fn to_fields(&self) -> OutboundFields {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.to_plain()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Data {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
