//! Single-record update operators.

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use spnet_value::{Document, Value, ID_FIELD};

/// Positional placeholder segment in update paths.
const POSITIONAL: &str = "$";

/// How [`Update::Pull`] selects the elements to remove.
#[derive(Debug, Clone, PartialEq)]
pub enum PullMatch {
    /// Elements equal to the value.
    Equal(Value),
    /// Element documents satisfying the filter.
    Matching(Filter),
}

/// An atomic modification of one record.
///
/// Paths in [`Update::Set`] and [`Update::Push`] may contain a `$`
/// segment, which stands for the index of the first array element the
/// update's filter matched.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Set each path to its value, creating intermediate documents.
    Set(Vec<(String, Value)>),
    /// Remove each path.
    Unset(Vec<String>),
    /// Append a value to the array at a path (creating the array).
    Push {
        /// Array path.
        field: String,
        /// Appended element.
        value: Value,
    },
    /// Remove every matching element from the array at a path.
    Pull {
        /// Array path.
        field: String,
        /// Element selector.
        matcher: PullMatch,
    },
}

impl Update {
    /// Sets a single path.
    #[must_use]
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set(vec![(path.into(), value.into())])
    }

    /// Sets every `(path, value)` pair.
    #[must_use]
    pub fn set_all<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Set(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Removes a single path.
    #[must_use]
    pub fn unset(path: impl Into<String>) -> Self {
        Self::Unset(vec![path.into()])
    }

    /// Appends to an array.
    #[must_use]
    pub fn push(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Push {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Removes array elements equal to `value`.
    #[must_use]
    pub fn pull(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Pull {
            field: field.into(),
            matcher: PullMatch::Equal(value.into()),
        }
    }

    /// Removes array element documents matching `filter`.
    #[must_use]
    pub fn pull_matching(field: impl Into<String>, filter: Filter) -> Self {
        Self::Pull {
            field: field.into(),
            matcher: PullMatch::Matching(filter),
        }
    }

    /// Applies the update to `doc`, which `filter` selected.
    ///
    /// Returns whether the document changed. On error `doc` may be
    /// partially modified; stores apply updates to a copy.
    pub(crate) fn apply(&self, doc: &mut Document, filter: &Filter) -> StoreResult<bool> {
        match self {
            Update::Set(pairs) => {
                let mut modified = false;
                for (path, value) in pairs {
                    let path = resolve_positional(doc, filter, path)?;
                    guard_id(&path)?;
                    let previous = doc.set_path(&path, value.clone())?;
                    modified |= previous.as_ref() != Some(value);
                }
                Ok(modified)
            }
            Update::Unset(paths) => {
                let mut modified = false;
                for path in paths {
                    let path = resolve_positional(doc, filter, path)?;
                    guard_id(&path)?;
                    modified |= doc.remove_path(&path).is_some();
                }
                Ok(modified)
            }
            Update::Push { field, value } => {
                let field = resolve_positional(doc, filter, field)?;
                guard_id(&field)?;
                match doc.get_path_mut(&field) {
                    Some(Value::Array(items)) => items.push(value.clone()),
                    Some(other) => {
                        return Err(StoreError::invalid_update(format!(
                            "cannot push to {field}: it holds {}",
                            other.type_name()
                        )))
                    }
                    None => {
                        doc.set_path(&field, Value::Array(vec![value.clone()]))?;
                    }
                }
                Ok(true)
            }
            Update::Pull { field, matcher } => {
                let field = resolve_positional(doc, filter, field)?;
                match doc.get_path_mut(&field) {
                    Some(Value::Array(items)) => {
                        let before = items.len();
                        items.retain(|item| !matcher.selects(item));
                        Ok(items.len() != before)
                    }
                    Some(other) => Err(StoreError::invalid_update(format!(
                        "cannot pull from {field}: it holds {}",
                        other.type_name()
                    ))),
                    None => Ok(false),
                }
            }
        }
    }
}

impl PullMatch {
    fn selects(&self, item: &Value) -> bool {
        match self {
            PullMatch::Equal(value) => item == value,
            PullMatch::Matching(filter) => item.as_map().is_some_and(|doc| filter.matches(doc)),
        }
    }
}

fn guard_id(path: &str) -> StoreResult<()> {
    if path == ID_FIELD || path.starts_with("_id.") {
        return Err(StoreError::invalid_update("the _id field is immutable"));
    }
    Ok(())
}

/// Replaces a `$` segment with the index of the element `filter` matched.
fn resolve_positional(doc: &Document, filter: &Filter, path: &str) -> StoreResult<String> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some(at) = segments.iter().position(|s| *s == POSITIONAL) else {
        return Ok(path.to_string());
    };
    if at == 0 {
        return Err(StoreError::invalid_update(format!(
            "positional path {path} names no array"
        )));
    }
    let array_field = segments[..at].join(".");
    let index = filter
        .positional_index(doc, &array_field)
        .ok_or_else(|| {
            StoreError::invalid_update(format!(
                "no element of {array_field} matched the filter for {path}"
            ))
        })?;
    let index = index.to_string();
    let resolved: Vec<&str> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| if i == at { index.as_str() } else { s })
        .collect();
    Ok(resolved.join("."))
}
