//! Fetch-or-create from external metadata sources.
//!
//! Bibliographic records (arXiv, PubMed, DOI) and social profiles are
//! created the first time they are referenced: the mapper looks the
//! natural key up in the store and only on a miss asks the external
//! source for the metadata.
//!
//! Concurrent callers racing on the same key are serialised by the
//! store: nested kinds carry a unique index on their key path, and a new
//! parent record is inserted together with its child in a single write.
//! The loser's insert fails with a duplicate key and is turned into a
//! fetch of the winner's entity.

use crate::entity::{ops, Entity};
use crate::error::{CoreError, CoreResult, ExternalError};
use crate::field_path::FieldPath;
use crate::mapper::{Mapper, NewEntity};
use crate::registry::KindId;
use crate::types::{EntityRef, Key, KeyPolicy, Lookup, Topology};
use spnet_value::{Document, ID_FIELD};
use std::fmt;
use tracing::debug;

/// A source of metadata for entities not yet stored.
pub trait ExternalSource: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str;

    /// Fetches the metadata stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExternalError`] when the source cannot answer.
    fn fetch(&self, key: &Key) -> Result<Document, ExternalError>;
}

/// An [`ExternalSource`] backed by a closure.
///
/// ```rust
/// use spnet_core::{ExternalSource, FnSource, Key};
/// use spnet_value::doc;
///
/// let arxiv = FnSource::new("arxiv", |key: &Key| {
///     Ok(doc! { "title" => format!("paper {key}") })
/// });
/// assert_eq!(arxiv.name(), "arxiv");
/// ```
pub struct FnSource<F> {
    name: String,
    fetch: F,
}

impl<F> FnSource<F>
where
    F: Fn(&Key) -> Result<Document, ExternalError> + Send + Sync,
{
    /// Wraps `fetch` under `name`.
    pub fn new(name: impl Into<String>, fetch: F) -> Self {
        Self {
            name: name.into(),
            fetch,
        }
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> ExternalSource for FnSource<F>
where
    F: Fn(&Key) -> Result<Document, ExternalError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, key: &Key) -> Result<Document, ExternalError> {
        (self.fetch)(key)
    }
}

pub(crate) fn get_or_create(
    mapper: &Mapper,
    kind_id: KindId,
    key: Key,
    parent: Option<EntityRef>,
    source: &dyn ExternalSource,
) -> CoreResult<Entity> {
    let kind = mapper.registry().kind(kind_id)?;
    let lookup = match (kind.topology(), &parent) {
        (Topology::TopLevel, _) if kind.key_policy() == KeyPolicy::Generated => {
            return Err(CoreError::invalid_operation(format!(
                "{} keys are generated by the store; nothing to look up",
                kind.name()
            )));
        }
        (Topology::ArrayElement, Some(parent)) => Lookup::Element {
            parent: parent.key.clone(),
            key: key.clone(),
        },
        (Topology::ArrayElement, None) => {
            return Err(CoreError::invalid_operation(format!(
                "{} needs a parent record",
                kind.name()
            )));
        }
        _ => Lookup::Key(key.clone()),
    };

    match ops::fetch(mapper, kind_id, lookup.clone()) {
        Ok(found) => {
            debug!(kind = kind.name(), %key, "get_or_create hit");
            return Ok(found);
        }
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    debug!(kind = kind.name(), %key, source = source.name(), "fetching from external source");
    let mut data = source.fetch(&key)?;
    data.insert(kind.path().map_or(ID_FIELD, FieldPath::key_field), key.to_value());

    let mut new = NewEntity::new(data);
    match parent {
        Some(parent) => new = new.parent(parent),
        None if kind.topology().is_nested() => {
            debug!(kind = kind.name(), %key, "creating parent record from external data");
        }
        None => {}
    }
    ops::insert_or_fetch(mapper, kind_id, new, lookup)
}
