//! Entity identity.

use crate::registry::KindId;
use crate::types::{EntityRef, Key};
use std::fmt;

/// What makes two entity instances the same entity.
///
/// Instances fetched separately compare equal when their identities do;
/// attribute values and link caches play no part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    /// A top-level record.
    Document(EntityRef),
    /// The embedded sub-document of kind `kind` inside `parent`.
    Embedded {
        /// Owning record.
        parent: EntityRef,
        /// Embedded kind.
        kind: KindId,
    },
    /// An array element, keyed within its parent.
    Element {
        /// Owning record.
        parent: EntityRef,
        /// Element kind.
        kind: KindId,
        /// Per-parent key.
        key: Key,
    },
    /// An array element keyed across the whole collection.
    UniqueElement {
        /// Element kind.
        kind: KindId,
        /// Global key.
        key: Key,
    },
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Document(reference) => write!(f, "{reference}"),
            Identity::Embedded { parent, kind } => write!(f, "{parent}#{}", kind.index()),
            Identity::Element { parent, kind, key } => {
                write!(f, "{parent}#{}[{key}]", kind.index())
            }
            Identity::UniqueElement { kind, key } => write!(f, "#{}[{key}]", kind.index()),
        }
    }
}
