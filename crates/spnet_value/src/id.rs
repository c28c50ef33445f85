//! Store-generated object identifier.

use crate::error::{ValueError, ValueResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier generated by a store for a new record.
///
/// Object IDs are 128-bit random values that are:
/// - Unique within a store
/// - Immutable once assigned
/// - Rendered as 32 lowercase hex digits
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 16]);

impl ObjectId {
    /// Creates an object ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a new random object ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses an object ID from its hex form.
    ///
    /// Both the plain 32-digit form and the hyphenated UUID form are
    /// accepted.
    pub fn parse_str(input: &str) -> ValueResult<Self> {
        Uuid::try_parse(input)
            .map(|uuid| Self(uuid.into_bytes()))
            .map_err(|_| ValueError::InvalidObjectId {
                input: input.to_string(),
            })
    }

    /// Returns the 32-digit hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        Uuid::from_bytes(self.0).simple().to_string()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl From<[u8; 16]> for ObjectId {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<ObjectId> for [u8; 16] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        assert_ne!(ObjectId::new(), ObjectId::new());
    }

    #[test]
    fn hex_form_parses_back() {
        let id = ObjectId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(ObjectId::parse_str(&hex).unwrap(), id);
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn hyphenated_form_is_accepted() {
        let id = ObjectId::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(id.to_hex(), "67e5504410b1426f9247bb680e5fe0c8");
    }

    #[test]
    fn garbage_is_rejected() {
        let err = ObjectId::parse_str("abcdefg").unwrap_err();
        assert!(matches!(err, ValueError::InvalidObjectId { .. }));
    }

    #[test]
    fn ordering_follows_bytes() {
        let a = ObjectId::from_bytes([0; 16]);
        let b = ObjectId::from_bytes([1; 16]);
        assert!(a < b);
    }
}
