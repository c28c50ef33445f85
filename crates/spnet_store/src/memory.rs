//! In-memory document store.

use crate::backend::DocumentStore;
use crate::error::{StoreError, StoreResult};
use crate::filter::{values_at, Filter};
use crate::options::{FindOptions, IndexSpec, Projection, UpdateResult};
use crate::stats::StoreStats;
use crate::update::Update;
use parking_lot::RwLock;
use spnet_value::{Document, ObjectId, Value, ID_FIELD};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

/// Insertion sequence number; orders records within a collection.
type Seq = u64;

/// Unique index over one dotted path.
#[derive(Debug)]
struct UniqueIndex {
    path: String,
    entries: HashMap<Value, Seq>,
}

impl UniqueIndex {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Indexed keys of a record. Arrays contribute each element; nulls
    /// and missing paths contribute nothing.
    fn keys_of(&self, doc: &Document) -> Vec<Value> {
        let mut keys = Vec::new();
        for value in values_at(doc, &self.path) {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    keys.extend(items.iter().filter(|v| !v.is_null()).cloned());
                }
                other => keys.push(other.clone()),
            }
        }
        keys
    }

    /// First key of `doc` owned by another record or repeated within `doc`.
    fn conflict(&self, doc: &Document, seq: Seq) -> Option<Value> {
        let mut seen = HashSet::new();
        for key in self.keys_of(doc) {
            if !seen.insert(key.clone()) {
                return Some(key);
            }
            if matches!(self.entries.get(&key), Some(owner) if *owner != seq) {
                return Some(key);
            }
        }
        None
    }

    fn add(&mut self, doc: &Document, seq: Seq) {
        for key in self.keys_of(doc) {
            self.entries.insert(key, seq);
        }
    }

    fn remove(&mut self, doc: &Document, seq: Seq) {
        for key in self.keys_of(doc) {
            if self.entries.get(&key) == Some(&seq) {
                self.entries.remove(&key);
            }
        }
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    records: BTreeMap<Seq, Document>,
    by_id: HashMap<Value, Seq>,
    next_seq: Seq,
    indexes: Vec<IndexSpec>,
    unique: Vec<UniqueIndex>,
}

impl CollectionState {
    /// First record matching `filter`, by primary key when the filter
    /// pins one.
    fn locate(&self, filter: &Filter, stats: &StoreStats) -> Option<Seq> {
        if let Some(id) = filter.id_lookup() {
            stats.record_index_lookup();
            let seq = *self.by_id.get(id)?;
            return self
                .records
                .get(&seq)
                .filter(|doc| filter.matches(doc))
                .map(|_| seq);
        }
        stats.record_scan();
        self.records
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(seq, _)| *seq)
    }

    fn matching(&self, filter: &Filter, stats: &StoreStats) -> Vec<&Document> {
        if filter.id_lookup().is_some() {
            return self
                .locate(filter, stats)
                .and_then(|seq| self.records.get(&seq))
                .into_iter()
                .collect();
        }
        stats.record_scan();
        self.records
            .values()
            .filter(|doc| filter.matches(doc))
            .collect()
    }

    fn check_unique(&self, collection: &str, doc: &Document, seq: Seq) -> StoreResult<()> {
        for index in &self.unique {
            if let Some(key) = index.conflict(doc, seq) {
                return Err(StoreError::duplicate_key(collection, &index.path, key));
            }
        }
        Ok(())
    }

    /// Gives `doc` an `_id` if it has none and checks it against every
    /// key constraint, without storing it.
    fn check_insert(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        let id = match doc.id() {
            Some(id) => id.clone(),
            None => {
                let id = Value::Id(ObjectId::new());
                doc.insert(ID_FIELD, id.clone());
                id
            }
        };
        if self.by_id.contains_key(&id) {
            return Err(StoreError::duplicate_key(collection, ID_FIELD, id));
        }
        self.check_unique(collection, &doc, self.next_seq)?;
        Ok(doc)
    }

    /// Stores a record that passed [`Self::check_insert`].
    fn apply_insert(&mut self, doc: Document) -> Seq {
        let seq = self.next_seq;
        self.next_seq += 1;
        for index in &mut self.unique {
            index.add(&doc, seq);
        }
        if let Some(id) = doc.id() {
            self.by_id.insert(id.clone(), seq);
        }
        self.records.insert(seq, doc);
        seq
    }

    fn insert(&mut self, collection: &str, doc: Document) -> StoreResult<Seq> {
        let doc = self.check_insert(collection, doc)?;
        Ok(self.apply_insert(doc))
    }

    /// Swaps in a new version of a record whose indexes were checked.
    fn replace(&mut self, seq: Seq, doc: Document) {
        if let Some(old) = self.records.get(&seq) {
            for index in &mut self.unique {
                index.remove(old, seq);
            }
        }
        for index in &mut self.unique {
            index.add(&doc, seq);
        }
        self.records.insert(seq, doc);
    }

    /// The new version `update` makes of the first matching record,
    /// checked against the unique indexes but not yet stored.
    fn check_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        stats: &StoreStats,
    ) -> StoreResult<(UpdateResult, Option<(Seq, Document)>)> {
        let Some(seq) = self.locate(filter, stats) else {
            return Ok((UpdateResult::default(), None));
        };
        let Some(mut doc) = self.records.get(&seq).cloned() else {
            return Ok((UpdateResult::default(), None));
        };
        if !update.apply(&mut doc, filter)? {
            return Ok((
                UpdateResult {
                    matched: 1,
                    modified: 0,
                },
                None,
            ));
        }
        self.check_unique(collection, &doc, seq)?;
        Ok((
            UpdateResult {
                matched: 1,
                modified: 1,
            },
            Some((seq, doc)),
        ))
    }

    fn remove(&mut self, seq: Seq) -> Option<Document> {
        let doc = self.records.remove(&seq)?;
        for index in &mut self.unique {
            index.remove(&doc, seq);
        }
        if let Some(id) = doc.id() {
            self.by_id.remove(id);
        }
        Some(doc)
    }

    /// Builds the unique index `spec` declares over the current records,
    /// if there is not one on its path yet.
    fn check_index(
        &self,
        collection: &str,
        spec: &IndexSpec,
    ) -> StoreResult<Option<UniqueIndex>> {
        if !spec.unique || self.unique.iter().any(|index| index.path == spec.path) {
            return Ok(None);
        }
        let mut index = UniqueIndex::new(&spec.path);
        for (seq, doc) in &self.records {
            if let Some(key) = index.conflict(doc, *seq) {
                return Err(StoreError::duplicate_key(collection, &spec.path, key));
            }
            index.add(doc, *seq);
        }
        Ok(Some(index))
    }

    fn apply_index(&mut self, spec: &IndexSpec, index: Option<UniqueIndex>) {
        self.unique.extend(index);
        self.indexes.push(spec.clone());
    }
}

/// An in-memory document store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral deployments that don't need persistence
///
/// # Thread Safety
///
/// All collections sit behind one read-write lock, so every write is
/// atomic and serialized with respect to every other.
///
/// # Example
///
/// ```rust
/// use spnet_store::{DocumentStore, Filter, IndexSpec, InMemoryStore};
/// use spnet_value::doc;
///
/// let store = InMemoryStore::new();
/// store.ensure_index("paper", &IndexSpec::unique("arxiv.id")).unwrap();
///
/// store.insert("paper", doc! { "arxiv" => doc! { "id" => "1302.1234" } }).unwrap();
/// let err = store
///     .insert("paper", doc! { "arxiv" => doc! { "id" => "1302.1234" } })
///     .unwrap_err();
/// assert!(err.is_duplicate_key());
/// assert_eq!(store.count("paper", &Filter::new()).unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, CollectionState>>,
    stats: StoreStats,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation counters.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Names of collections that have been written to or indexed.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Indexes declared on a collection.
    #[must_use]
    pub fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.collections
            .read()
            .get(collection)
            .map(|state| state.indexes.clone())
            .unwrap_or_default()
    }

    fn track<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            if err.is_duplicate_key() {
                self.stats.record_duplicate();
            }
        }
        result
    }

    /// Inserts and returns the stored record (with its `_id`).
    ///
    /// `log` sees the checked record before it is stored; when it fails
    /// the store is left unchanged. The same holds for the other write
    /// paths below.
    pub(crate) fn insert_document(
        &self,
        collection: &str,
        document: Document,
        log: impl FnOnce(&Document) -> StoreResult<()>,
    ) -> StoreResult<Document> {
        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        let stored = self.track(state.check_insert(collection, document))?;
        log(&stored)?;
        state.apply_insert(stored.clone());
        self.stats.record_write();
        trace!(collection, id = ?stored.id(), "inserted record");
        Ok(stored)
    }

    /// Updates the first matching record, handing its new version to
    /// `log` when it changed.
    pub(crate) fn update_document(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        log: impl FnOnce(&Document) -> StoreResult<()>,
    ) -> StoreResult<UpdateResult> {
        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        let (result, changed) =
            self.track(state.check_update(collection, filter, update, &self.stats))?;
        if let Some((seq, doc)) = changed {
            log(&doc)?;
            state.replace(seq, doc);
            self.stats.record_write();
        }
        trace!(
            collection,
            matched = result.matched,
            modified = result.modified,
            "updated record"
        );
        Ok(result)
    }

    /// Deletes the first matching record and returns its `_id`.
    pub(crate) fn delete_document(
        &self,
        collection: &str,
        filter: &Filter,
        log: impl FnOnce(&Value) -> StoreResult<()>,
    ) -> StoreResult<Option<Value>> {
        let mut collections = self.collections.write();
        let Some(state) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let located = state.locate(filter, &self.stats).and_then(|seq| {
            let id = state.records.get(&seq)?.id()?.clone();
            Some((seq, id))
        });
        let Some((seq, id)) = located else {
            trace!(collection, "no record to delete");
            return Ok(None);
        };
        log(&id)?;
        state.remove(seq);
        self.stats.record_delete();
        trace!(collection, id = ?id, "deleted record");
        Ok(Some(id))
    }

    /// Declares an index, handing it to `log` only when it is new.
    pub(crate) fn index_collection(
        &self,
        collection: &str,
        spec: &IndexSpec,
        log: impl FnOnce() -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        if state.indexes.contains(spec) {
            return Ok(());
        }
        let index = self.track(state.check_index(collection, spec))?;
        log()?;
        state.apply_index(spec, index);
        trace!(collection, path = %spec.path, unique = spec.unique, "ensured index");
        Ok(())
    }

    /// Writes a record version read back from a log, inserting or
    /// replacing by `_id`.
    pub(crate) fn restore(&self, collection: &str, document: Document) -> StoreResult<()> {
        let id = document
            .id()
            .cloned()
            .ok_or_else(|| StoreError::Corrupted(format!("logged {collection} record has no _id")))?;
        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        match state.by_id.get(&id).copied() {
            Some(seq) => {
                state.check_unique(collection, &document, seq)?;
                state.replace(seq, document);
            }
            None => {
                state.insert(collection, document)?;
            }
        }
        Ok(())
    }

    /// Removes a record by `_id` while replaying a log.
    pub(crate) fn restore_delete(&self, collection: &str, id: &Value) {
        let mut collections = self.collections.write();
        if let Some(state) = collections.get_mut(collection) {
            if let Some(seq) = state.by_id.get(id).copied() {
                state.remove(seq);
            }
        }
    }
}

impl DocumentStore for InMemoryStore {
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<Option<Document>> {
        self.stats.record_read();
        let collections = self.collections.read();
        let Some(state) = collections.get(collection) else {
            return Ok(None);
        };
        let found = state
            .locate(filter, &self.stats)
            .and_then(|seq| state.records.get(&seq))
            .map(|doc| match projection {
                Some(projection) => projection.apply(doc),
                None => doc.clone(),
            });
        trace!(collection, found = found.is_some(), "find_one");
        Ok(found)
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        self.stats.record_read();
        let collections = self.collections.read();
        let Some(state) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let docs: Vec<Document> = state
            .matching(filter, &self.stats)
            .into_iter()
            .cloned()
            .collect();
        trace!(collection, matched = docs.len(), "find");
        Ok(options.finish(docs))
    }

    fn insert(&self, collection: &str, document: Document) -> StoreResult<Value> {
        let stored = self.insert_document(collection, document, |_| Ok(()))?;
        Ok(stored.id().cloned().unwrap_or(Value::Null))
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        self.update_document(collection, filter, update, |_| Ok(()))
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> StoreResult<bool> {
        self.delete_document(collection, filter, |_| Ok(()))
            .map(|id| id.is_some())
    }

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.stats.record_read();
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map_or(0, |state| state.matching(filter, &self.stats).len() as u64))
    }

    fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()> {
        self.index_collection(collection, spec, || Ok(()))
    }
}
