//! Keys, references and policies shared across the mapping layer.

use spnet_value::{ObjectId, Value};
use std::fmt;

/// The key of a record or array element.
///
/// Store-generated keys are [`ObjectId`]s; application-supplied keys
/// (topic names, bibliographic ids, e-mail addresses) are text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Store-generated opaque id.
    Id(ObjectId),
    /// Application-supplied key.
    Text(String),
}

impl Key {
    /// The stored representation of this key.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Key::Id(id) => Value::Id(*id),
            Key::Text(text) => Value::Text(text.clone()),
        }
    }

    /// Reads a key back from a stored value. Only ids and text are keys.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Id(id) => Some(Key::Id(*id)),
            Value::Text(text) => Some(Key::Text(text.clone())),
            _ => None,
        }
    }

    /// The object id, if this is a generated key.
    #[must_use]
    pub fn as_id(&self) -> Option<ObjectId> {
        match self {
            Key::Id(id) => Some(*id),
            Key::Text(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{id}"),
            Key::Text(text) => f.write_str(text),
        }
    }
}

impl From<ObjectId> for Key {
    fn from(id: ObjectId) -> Self {
        Key::Id(id)
    }
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Key::Text(text.to_string())
    }
}

impl From<String> for Key {
    fn from(text: String) -> Self {
        Key::Text(text)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        key.to_value()
    }
}

impl From<&Key> for Value {
    fn from(key: &Key) -> Self {
        key.to_value()
    }
}

/// Opaque identity of a top-level record: `(collection, key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    /// Physical collection.
    pub collection: String,
    /// Primary key.
    pub key: Key,
}

impl EntityRef {
    /// Creates a reference.
    pub fn new(collection: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// How top-level records of a kind get their primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPolicy {
    /// The store generates an [`ObjectId`].
    Generated,
    /// The application supplies a text key.
    Supplied,
}

impl KeyPolicy {
    /// Brings a lookup key into the form records of this policy carry.
    ///
    /// Text given for a generated kind is parsed as an object id; text
    /// that does not parse can never match, so `None` is returned.
    #[must_use]
    pub fn normalize(self, key: &Key) -> Option<Key> {
        match (self, key) {
            (KeyPolicy::Generated, Key::Text(text)) => {
                ObjectId::parse_str(text).ok().map(Key::Id)
            }
            _ => Some(key.clone()),
        }
    }
}

/// The storage shape of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// One record per entity.
    TopLevel,
    /// A sub-document under one field of a parent record.
    Embedded,
    /// An element of a parent's array, unique within that parent.
    ArrayElement,
    /// An element of a parent's array, unique across the collection.
    UniqueArrayElement,
}

impl Topology {
    /// Whether entities of this shape live inside a parent record.
    #[must_use]
    pub const fn is_nested(self) -> bool {
        !matches!(self, Topology::TopLevel)
    }

    /// Whether entities of this shape are array elements.
    #[must_use]
    pub const fn is_array(self) -> bool {
        matches!(self, Topology::ArrayElement | Topology::UniqueArrayElement)
    }
}

/// What constructing an entity does with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InsertPolicy {
    /// Fetch the entity by the key in the data; never write.
    FetchOnly,
    /// Insert the data.
    #[default]
    InsertNew,
    /// Fetch by key, inserting when absent.
    FindOrInsert,
}

/// How to find one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// By the kind's own key: primary key for top-level kinds, natural
    /// key for embedded and unique-array kinds.
    Key(Key),
    /// An array element by its parent's primary key and its own key.
    Element {
        /// Parent primary key.
        parent: Key,
        /// Element key.
        key: Key,
    },
}

impl Lookup {
    /// An array-element lookup.
    pub fn element(parent: impl Into<Key>, key: impl Into<Key>) -> Self {
        Lookup::Element {
            parent: parent.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Key(key) => write!(f, "{key}"),
            Lookup::Element { parent, key } => write!(f, "({parent}, {key})"),
        }
    }
}

impl From<Key> for Lookup {
    fn from(key: Key) -> Self {
        Lookup::Key(key)
    }
}

impl From<ObjectId> for Lookup {
    fn from(id: ObjectId) -> Self {
        Lookup::Key(Key::Id(id))
    }
}

impl From<&str> for Lookup {
    fn from(text: &str) -> Self {
        Lookup::Key(Key::from(text))
    }
}

impl From<String> for Lookup {
    fn from(text: String) -> Self {
        Lookup::Key(Key::Text(text))
    }
}
