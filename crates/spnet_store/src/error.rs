//! Error types for store operations.

use spnet_value::{Value, ValueError};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would give two records (or two elements) the same key
    /// under a unique index.
    #[error("duplicate key {key:?} for index {index} in collection {collection}")]
    DuplicateKey {
        /// Collection written to.
        collection: String,
        /// Indexed path (`_id` for the primary key).
        index: String,
        /// The colliding key.
        key: Value,
    },

    /// The update cannot be applied to the matched record.
    #[error("invalid update: {message}")]
    InvalidUpdate {
        /// Description of the problem.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be encoded, decoded or addressed.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The persisted operation log is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    Locked,
}

impl StoreError {
    /// Creates an invalid update error.
    pub fn invalid_update(message: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            message: message.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(collection: &str, index: &str, key: Value) -> Self {
        Self::DuplicateKey {
            collection: collection.to_string(),
            index: index.to_string(),
            key,
        }
    }

    /// Whether this is a unique-index violation.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
