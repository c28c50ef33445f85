//! Ordered field map: one stored record or nested sub-record.

use crate::error::{ValueError, ValueResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Name of the identity field every top-level record carries.
pub const ID_FIELD: &str = "_id";

/// A document: field names mapped to values.
///
/// Field order is lexicographic, which keeps equality, hashing and the
/// persisted encoding independent of insertion order.
///
/// Dotted paths (`"arxiv.id"`, `"authors.0"`) descend through nested
/// documents and, with numeric segments, into arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the value of a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a mutable reference to a top-level field.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Whether a top-level field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets a top-level field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a top-level field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Builder-style variant of [`Document::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// The `_id` field, if present.
    pub fn id(&self) -> Option<&Value> {
        self.get(ID_FIELD)
    }

    /// Iterates over fields in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Iterates over field names in key order.
    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.0.keys()
    }

    /// Overwrites this document's fields with every field of `other`.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns a copy holding only the listed top-level fields (plus `_id`).
    #[must_use]
    pub fn project<S: AsRef<str>>(&self, fields: &[S]) -> Document {
        let mut out = Document::new();
        if let Some(id) = self.id() {
            out.insert(ID_FIELD, id.clone());
        }
        for field in fields {
            let field = field.as_ref();
            let top = field.split('.').next().unwrap_or(field);
            if let Some(value) = self.get(top) {
                out.insert(top, value.clone());
            }
        }
        out
    }

    /// Resolves a dotted path.
    ///
    /// Numeric segments index into arrays; any other segment looks up a
    /// field of a nested document.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes a value at a dotted path, creating missing nested documents.
    ///
    /// Numeric segments address existing array slots (or the slot right
    /// after the last one). Descending into a scalar is a
    /// [`ValueError::PathConflict`].
    pub fn set_path(&mut self, path: &str, value: Value) -> ValueResult<Option<Value>> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Ok(self.insert(path, value)),
        };
        if parents.is_empty() {
            return Ok(self.insert(*last, value));
        }

        let mut current = self
            .0
            .entry(parents[0].to_string())
            .or_insert_with(|| Value::Map(Document::new()));
        for segment in &parents[1..] {
            current = descend_or_create(current, segment, path)?;
        }
        match current {
            Value::Map(map) => Ok(map.insert(*last, value)),
            Value::Array(items) => {
                let index = last
                    .parse::<usize>()
                    .map_err(|_| ValueError::path_conflict(path, "array"))?;
                if index < items.len() {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                } else if index == items.len() {
                    items.push(value);
                    Ok(None)
                } else {
                    Err(ValueError::path_conflict(path, "array"))
                }
            }
            other => Err(ValueError::path_conflict(path, other.type_name())),
        }
    }

    /// Removes the value at a dotted path, if it exists.
    ///
    /// Only document fields are removed; array slots are left in place.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match path.rsplit_once('.') {
            None => self.remove(path),
            Some((parent, last)) => match self.get_path_mut(parent)? {
                Value::Map(map) => map.remove(last),
                _ => None,
            },
        }
    }

    /// Mutable variant of [`Document::get_path`].
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get_mut(first)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn descend_or_create<'a>(
    current: &'a mut Value,
    segment: &str,
    path: &str,
) -> ValueResult<&'a mut Value> {
    match current {
        Value::Map(map) => Ok(map
            .0
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(Document::new()))),
        Value::Array(items) => {
            let index = segment
                .parse::<usize>()
                .map_err(|_| ValueError::path_conflict(path, "array"))?;
            items
                .get_mut(index)
                .ok_or_else(|| ValueError::path_conflict(path, "array"))
        }
        other => Err(ValueError::path_conflict(path, other.type_name())),
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for BTreeMap<String, Value> {
    fn from(doc: Document) -> Self {
        doc.0
    }
}

impl TryFrom<Value> for Document {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(doc) => Ok(doc),
            other => Err(ValueError::NotADocument {
                found: other.type_name(),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Document {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.0.insert(k.into(), v.into());
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
