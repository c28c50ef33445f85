//! Error types for the mapping layer.

use spnet_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in mapping-layer operations.
///
/// [`CoreError::NotFound`] and [`CoreError::DuplicateKey`] are expected
/// control-flow signals; use [`CoreError::is_not_found`] and
/// [`CoreError::is_duplicate_key`] to branch on them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A fetch by key found nothing.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Entity kind that was fetched.
        kind: String,
        /// Key that was looked up.
        key: String,
    },

    /// An insert or update is missing a required field.
    #[error("{kind} requires field {field}")]
    Validation {
        /// Entity kind being written.
        kind: String,
        /// The offending field.
        field: String,
    },

    /// A field path does not have the `container.keyField` form.
    #[error("malformed field path {path:?}: expected exactly one dot")]
    MalformedFieldPath {
        /// The rejected path.
        path: String,
    },

    /// A write collided with a uniqueness invariant.
    #[error("duplicate {kind} key {key}")]
    DuplicateKey {
        /// Entity kind being written.
        kind: String,
        /// The colliding key.
        key: String,
    },

    /// An external metadata source failed.
    #[error(transparent)]
    ExternalSource(#[from] ExternalError),

    /// `array_del` was asked to remove a value that is not present.
    #[error("value not present in {kind}.{field}")]
    ValueNotInArray {
        /// Entity kind being modified.
        kind: String,
        /// The array attribute.
        field: String,
    },

    /// A link has no data and declares no missing-data sentinel.
    #[error("{kind}.{attr} has no link data")]
    MissingLink {
        /// Owning entity kind.
        kind: String,
        /// The link attribute.
        attr: String,
    },

    /// An optimistic array write lost a race with another writer.
    #[error("{kind} {key} was modified concurrently; re-fetch and retry")]
    Conflict {
        /// Entity kind being modified.
        kind: String,
        /// Key of the modified entity.
        key: String,
    },

    /// Operation not permitted for this kind or state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Backing store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Creates a validation error.
    pub fn validation(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            kind: kind.into(),
            field: field.into(),
        }
    }

    /// Creates a duplicate-key error.
    pub fn duplicate_key(kind: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::DuplicateKey {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Creates a value-not-in-array error.
    pub fn value_not_in_array(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValueNotInArray {
            kind: kind.into(),
            field: field.into(),
        }
    }

    /// Creates a missing-link error.
    pub fn missing_link(kind: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::MissingLink {
            kind: kind.into(),
            attr: attr.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(kind: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::Conflict {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Whether this is a [`CoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a [`CoreError::DuplicateKey`].
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

/// What went wrong in an external metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalErrorKind {
    /// The service could not be reached or refused the request.
    Unavailable,
    /// The caller's deadline expired.
    Timeout,
    /// The source has no record for the key.
    UnknownKey,
    /// The source answered with data that could not be used.
    Malformed,
}

impl fmt::Display for ExternalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timed out",
            Self::UnknownKey => "unknown key",
            Self::Malformed => "malformed response",
        };
        f.write_str(name)
    }
}

/// Failure reported by an [`ExternalSource`](crate::ExternalSource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("external source {source_name} {kind}: {message}")]
pub struct ExternalError {
    /// Name of the failing source.
    pub source_name: String,
    /// Failure category.
    pub kind: ExternalErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ExternalError {
    /// Creates an external error.
    pub fn new(
        source_name: impl Into<String>,
        kind: ExternalErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            message: message.into(),
        }
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, ExternalErrorKind::Unavailable, message)
    }

    /// Creates a `Timeout` error.
    pub fn timeout(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, ExternalErrorKind::Timeout, message)
    }

    /// Creates an `UnknownKey` error.
    pub fn unknown_key(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, ExternalErrorKind::UnknownKey, message)
    }

    /// Creates a `Malformed` error.
    pub fn malformed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, ExternalErrorKind::Malformed, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flow_predicates() {
        assert!(CoreError::not_found("Paper", "abc").is_not_found());
        assert!(CoreError::duplicate_key("Post", "p1").is_duplicate_key());
        assert!(!CoreError::conflict("Recommendation", "a1").is_not_found());
    }

    #[test]
    fn external_errors_are_not_not_found() {
        let err: CoreError = ExternalError::unavailable("arxiv", "503").into();
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "external source arxiv unavailable: 503");
    }

    #[test]
    fn messages_name_kind_and_key() {
        let err = CoreError::not_found("Paper", "P1");
        assert_eq!(err.to_string(), "Paper P1 not found");
    }
}
