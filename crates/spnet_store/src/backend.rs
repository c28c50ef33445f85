//! Document store trait definition.

use crate::error::StoreResult;
use crate::filter::Filter;
use crate::options::{FindOptions, IndexSpec, Projection, UpdateResult};
use crate::update::Update;
use spnet_value::{Document, Value};

/// A schema-less store of named document collections.
///
/// The mapper owns every notion of entity kind, key policy and link; a
/// store only evaluates [`Filter`]s, applies [`Update`]s and enforces
/// unique indexes.
///
/// # Invariants
///
/// - Each `insert`, `update_one` and `delete_one` is atomic with respect
///   to the single record it touches
/// - `update_one` and `delete_one` act on the first record (in insertion
///   order) matching the filter
/// - A write that would violate a unique index fails with
///   [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey) and
///   leaves the record untouched
/// - Reading a collection that was never written yields no records
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::InMemoryStore`] - For testing and ephemeral use
/// - [`crate::FileStore`] - For persistent storage
pub trait DocumentStore: Send + Sync {
    /// Returns the first record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<Option<Document>>;

    /// Returns every record matching `filter`, shaped by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>>;

    /// Inserts a record, returning its `_id`.
    ///
    /// A record without `_id` gets a freshly generated
    /// [`ObjectId`](spnet_value::ObjectId).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the `_id` or a unique-indexed value is
    /// already taken.
    fn insert(&self, collection: &str, document: Document) -> StoreResult<Value>;

    /// Applies `update` to the first record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` on a unique-index violation and
    /// `InvalidUpdate` if the update cannot apply to the matched record.
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult>;

    /// Deletes the first record matching `filter`. Returns whether one was
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn delete_one(&self, collection: &str, filter: &Filter) -> StoreResult<bool>;

    /// Counts records matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let docs = self.find(collection, filter, &FindOptions::new())?;
        Ok(docs.len() as u64)
    }

    /// Declares an index. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if existing records already violate a new
    /// unique index.
    fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()>;
}
