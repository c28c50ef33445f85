//! Error types for the value crate.

use thiserror::Error;

/// Result type for value operations.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur while building, addressing or encoding values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A string could not be parsed as an [`crate::ObjectId`].
    #[error("invalid object id: {input:?}")]
    InvalidObjectId {
        /// The rejected input.
        input: String,
    },

    /// A value that had to be a document was something else.
    #[error("expected a document, found {found}")]
    NotADocument {
        /// Type name of the value found instead.
        found: &'static str,
    },

    /// A dotted path could not be written because it runs through a
    /// value that is neither a document nor an array.
    #[error("path conflict at {path:?}: cannot descend into {found}")]
    PathConflict {
        /// The path being written.
        path: String,
        /// Type name of the blocking value.
        found: &'static str,
    },

    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes into a value.
    #[error("decoding failed: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },
}

impl ValueError {
    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a decoding error.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Create a path conflict error.
    pub fn path_conflict(path: impl Into<String>, found: &'static str) -> Self {
        Self::PathConflict {
            path: path.into(),
            found,
        }
    }
}
