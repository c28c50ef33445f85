//! Per-kind binding to a physical collection.

use crate::error::{CoreError, CoreResult};
use crate::types::Key;
use spnet_store::{
    DocumentStore, Filter, FindOptions, IndexSpec, Projection, PullMatch, StoreError, Update,
    UpdateResult,
};
use spnet_value::{Document, Value};
use std::fmt;
use std::sync::Arc;

/// Store access scoped to one entity kind's collection.
///
/// Store duplicate-key failures are reported as
/// [`CoreError::DuplicateKey`] naming the kind; absent records fetched by
/// [`StoreHandle::fetch_one`] become [`CoreError::NotFound`].
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn DocumentStore>,
    collection: String,
    kind: String,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("collection", &self.collection)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl StoreHandle {
    /// Binds `kind` to `collection` of `store`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            kind: kind.into(),
        }
    }

    /// The physical collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The kind name used in errors.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    fn map_err(&self, err: StoreError) -> CoreError {
        match err {
            StoreError::DuplicateKey { key, .. } => {
                let key = Key::from_value(&key).map_or_else(|| format!("{key:?}"), |k| k.to_string());
                CoreError::duplicate_key(&self.kind, key)
            }
            other => CoreError::Store(other),
        }
    }

    /// The first matching record; `NotFound` (naming `key`) when absent.
    pub fn fetch_one(
        &self,
        filter: &Filter,
        projection: Option<&Projection>,
        key: impl fmt::Display,
    ) -> CoreResult<Document> {
        self.find_one(filter, projection)?
            .ok_or_else(|| CoreError::not_found(&self.kind, key))
    }

    /// The first matching record, if any.
    pub fn find_one(
        &self,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> CoreResult<Option<Document>> {
        self.store
            .find_one(&self.collection, filter, projection)
            .map_err(|e| self.map_err(e))
    }

    /// Every matching record.
    pub fn fetch_many(&self, filter: &Filter, options: &FindOptions) -> CoreResult<Vec<Document>> {
        self.store
            .find(&self.collection, filter, options)
            .map_err(|e| self.map_err(e))
    }

    /// Inserts a record and returns its primary key.
    pub fn insert(&self, raw: Document) -> CoreResult<Key> {
        let id = self
            .store
            .insert(&self.collection, raw)
            .map_err(|e| self.map_err(e))?;
        Key::from_value(&id).ok_or_else(|| {
            CoreError::invalid_operation(format!("{} key {id:?} is neither id nor text", self.kind))
        })
    }

    /// Sets each `(path, value)` on the first matching record.
    pub fn set_fields(
        &self,
        filter: &Filter,
        fields: Vec<(String, Value)>,
    ) -> CoreResult<UpdateResult> {
        self.update(filter, &Update::Set(fields))
    }

    /// Removes each path from the first matching record.
    pub fn unset(&self, filter: &Filter, fields: Vec<String>) -> CoreResult<UpdateResult> {
        self.update(filter, &Update::Unset(fields))
    }

    /// Appends `value` to the array at `field`.
    pub fn push(&self, filter: &Filter, field: &str, value: Value) -> CoreResult<UpdateResult> {
        self.update(
            filter,
            &Update::Push {
                field: field.to_string(),
                value,
            },
        )
    }

    /// Removes matching elements from the array at `field`.
    pub fn pull(
        &self,
        filter: &Filter,
        field: &str,
        matcher: PullMatch,
    ) -> CoreResult<UpdateResult> {
        self.update(
            filter,
            &Update::Pull {
                field: field.to_string(),
                matcher,
            },
        )
    }

    fn update(&self, filter: &Filter, update: &Update) -> CoreResult<UpdateResult> {
        self.store
            .update_one(&self.collection, filter, update)
            .map_err(|e| self.map_err(e))
    }

    /// Deletes the first matching record.
    pub fn remove(&self, filter: &Filter) -> CoreResult<bool> {
        self.store
            .delete_one(&self.collection, filter)
            .map_err(|e| self.map_err(e))
    }

    /// Declares a unique index on `path`.
    pub fn ensure_unique(&self, path: &str) -> CoreResult<()> {
        self.store
            .ensure_index(&self.collection, &IndexSpec::unique(path))
            .map_err(|e| self.map_err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spnet_store::InMemoryStore;
    use spnet_value::doc;

    fn handle() -> StoreHandle {
        StoreHandle::new(Arc::new(InMemoryStore::new()), "topic", "Topic")
    }

    #[test]
    fn absent_record_is_not_found() {
        let err = handle()
            .fetch_one(&Filter::by_id("nope"), None, "nope")
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { ref kind, ref key } if kind == "Topic" && key == "nope"));
    }

    #[test]
    fn duplicate_key_names_the_kind() {
        let topics = handle();
        topics.insert(doc! { "_id" => "cosmology" }).unwrap();
        let err = topics.insert(doc! { "_id" => "cosmology" }).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { ref kind, ref key } if kind == "Topic" && key == "cosmology"));
    }

    #[test]
    fn insert_returns_generated_key() {
        let key = handle().insert(doc! { "name" => "x" }).unwrap();
        assert!(key.as_id().is_some());
    }
}
