//! Dotted `container.keyField` specifiers for nested kinds.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Where a nested entity lives inside its parent record.
///
/// `"recommendations.author"` means: the entities are elements of the
/// `recommendations` array, keyed by their `author` field. For embedded
/// kinds (`"arxiv.id"`) the container is a sub-document field and the key
/// field holds its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    container: String,
    key_field: String,
}

impl FieldPath {
    /// Parses a path with exactly one dot and two non-empty segments.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedFieldPath`] for anything else.
    pub fn parse(path: &str) -> CoreResult<Self> {
        let malformed = || CoreError::MalformedFieldPath {
            path: path.to_string(),
        };
        let (container, key_field) = path.split_once('.').ok_or_else(malformed)?;
        if container.is_empty() || key_field.is_empty() || key_field.contains('.') {
            return Err(malformed());
        }
        Ok(Self {
            container: container.to_string(),
            key_field: key_field.to_string(),
        })
    }

    /// The parent field holding the entity (or the array of entities).
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// The field inside the entity holding its key.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// `container.keyField`.
    #[must_use]
    pub fn key_path(&self) -> String {
        self.nested(&self.key_field)
    }

    /// `container.field`.
    #[must_use]
    pub fn nested(&self, field: &str) -> String {
        format!("{}.{field}", self.container)
    }

    /// `container.$.field`, addressing the array element a filter matched.
    #[must_use]
    pub fn positional(&self, field: &str) -> String {
        format!("{}.$.{field}", self.container)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.container, self.key_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_container_and_key() {
        let path = FieldPath::parse("recommendations.author").unwrap();
        assert_eq!(path.container(), "recommendations");
        assert_eq!(path.key_field(), "author");
        assert_eq!(path.key_path(), "recommendations.author");
        assert_eq!(path.nested("text"), "recommendations.text");
        assert_eq!(path.positional("sigs"), "recommendations.$.sigs");
    }

    #[test]
    fn rejects_wrong_dot_count() {
        for bad in ["", "arxiv", "a.b.c", ".id", "arxiv.", "."] {
            let err = FieldPath::parse(bad).unwrap_err();
            assert!(matches!(err, CoreError::MalformedFieldPath { .. }), "{bad}");
        }
    }

    proptest! {
        #[test]
        fn display_round_trips(container in "[a-z][a-zA-Z]{0,10}", key in "[a-z][a-zA-Z]{0,10}") {
            let text = format!("{container}.{key}");
            let path = FieldPath::parse(&text).unwrap();
            prop_assert_eq!(path.to_string(), text);
        }
    }
}
