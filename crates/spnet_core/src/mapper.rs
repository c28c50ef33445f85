//! The mapper facade.
//!
//! A [`Mapper`] owns the store, the built registry, one
//! [`StoreHandle`] per kind and the configuration. It is `Send + Sync`;
//! share it between threads behind an `Arc`.

use crate::config::MapperConfig;
use crate::entity::{ops, Entity};
use crate::error::{CoreError, CoreResult};
use crate::get_or_create::{self, ExternalSource};
use crate::handle::StoreHandle;
use crate::link::{resolve_link, LinkValue, Resolved};
use crate::registry::{KindId, Registry};
use crate::types::{EntityRef, InsertPolicy, Key, Lookup, Topology};
use spnet_store::{DocumentStore, Filter, FindOptions};
use spnet_value::{Document, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Data for a new entity.
///
/// ```rust
/// use spnet_core::{EntityRef, NewEntity};
/// use spnet_value::doc;
///
/// let paper = NewEntity::new(doc! { "title" => "boring article" });
/// let rec = NewEntity::new(doc! { "text" => "must read" })
///     .key("person-1")
///     .parent(EntityRef::new("paper", "p1"));
/// # let _ = (paper, rec);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NewEntity {
    pub(crate) key: Option<Key>,
    pub(crate) data: Document,
    pub(crate) parent: Option<EntityRef>,
    pub(crate) links: Vec<(String, LinkValue)>,
}

impl NewEntity {
    /// New entity data.
    #[must_use]
    pub fn new(data: Document) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Sets the entity's key: `_id` for top-level kinds, the key field
    /// for nested ones.
    #[must_use]
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Places a nested entity inside an existing parent record.
    #[must_use]
    pub fn parent(mut self, parent: EntityRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets link `attr`. Entities given here are stored by key and come
    /// back already resolved.
    #[must_use]
    pub fn link(mut self, attr: &str, value: impl Into<LinkValue>) -> Self {
        self.links.push((attr.to_string(), value.into()));
        self
    }
}

/// Typed access to a document store through a relation registry.
pub struct Mapper {
    store: Arc<dyn DocumentStore>,
    registry: Arc<Registry>,
    handles: Vec<StoreHandle>,
    config: MapperConfig,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("kinds", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Mapper {
    /// Opens a mapper with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if declaring the natural-key indexes fails, for
    /// instance because existing records already violate them.
    pub fn open(store: Arc<dyn DocumentStore>, registry: Registry) -> CoreResult<Self> {
        Self::open_with_config(store, registry, MapperConfig::default())
    }

    /// Opens a mapper with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if declaring the natural-key indexes fails.
    pub fn open_with_config(
        store: Arc<dyn DocumentStore>,
        registry: Registry,
        config: MapperConfig,
    ) -> CoreResult<Self> {
        let handles: Vec<StoreHandle> = registry
            .kinds()
            .map(|kind| StoreHandle::new(Arc::clone(&store), kind.collection(), kind.name()))
            .collect();

        if config.ensure_indexes {
            for (kind, handle) in registry.kinds().zip(&handles) {
                if matches!(kind.topology(), Topology::Embedded | Topology::UniqueArrayElement) {
                    let path = kind.field_path()?.key_path();
                    debug!(kind = kind.name(), %path, "ensuring unique natural-key index");
                    handle.ensure_unique(&path)?;
                }
            }
        }

        Ok(Self {
            store,
            registry: Arc::new(registry),
            handles,
            config,
        })
    }

    /// The relation registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The store handle of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a kind from another registry.
    pub fn handle(&self, kind: KindId) -> CoreResult<&StoreHandle> {
        self.handles.get(kind.index()).ok_or_else(|| {
            CoreError::invalid_operation(format!("no kind with index {}", kind.index()))
        })
    }

    /// The id of the kind called `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an unknown name.
    pub fn kind_id(&self, name: &str) -> CoreResult<KindId> {
        self.registry.kind_named(name).map(|kind| kind.id())
    }

    /// Fetches one entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing is stored under the key (including
    /// keys that cannot be keys of the kind), `InvalidOperation` when the
    /// lookup does not fit the kind's shape.
    pub fn fetch(&self, kind: KindId, lookup: impl Into<Lookup>) -> CoreResult<Entity> {
        ops::fetch(self, kind, lookup.into())
    }

    /// Creates an entity according to `policy`.
    ///
    /// # Errors
    ///
    /// - `Validation` when required fields or the key are missing
    /// - `DuplicateKey` when an insert collides with a uniqueness rule
    /// - `NotFound` for `FetchOnly` misses and absent parents
    pub fn construct(
        &self,
        kind: KindId,
        new: NewEntity,
        policy: InsertPolicy,
    ) -> CoreResult<Entity> {
        let spec = self.registry.kind(kind)?;
        match policy {
            InsertPolicy::InsertNew => ops::insert(self, kind, new),
            InsertPolicy::FetchOnly => ops::fetch(self, kind, ops::lookup_for(spec, &new)?),
            InsertPolicy::FindOrInsert => {
                let lookup = ops::lookup_for(spec, &new)?;
                match ops::fetch(self, kind, lookup.clone()) {
                    Err(err) if err.is_not_found() => ops::insert_or_fetch(self, kind, new, lookup),
                    other => other,
                }
            }
        }
    }

    /// Inserts a new entity.
    ///
    /// # Errors
    ///
    /// See [`Mapper::construct`].
    pub fn insert(&self, kind: KindId, new: NewEntity) -> CoreResult<Entity> {
        self.construct(kind, new, InsertPolicy::InsertNew)
    }

    /// Builds an entity from raw data without touching the store, for
    /// instance to wrap a fragment returned by a query.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the data lacks the kind's key and
    /// `InvalidOperation` when a nested kind is given no parent.
    pub fn wrap(
        &self,
        kind: KindId,
        raw: Document,
        parent: Option<EntityRef>,
    ) -> CoreResult<Entity> {
        Entity::build(&self.registry, kind, raw, parent)
    }

    /// Entities of `kind` whose stored records match `filter`.
    ///
    /// Filters address the stored records: nested kinds are queried with
    /// paths into their parent collection, such as
    /// `recommendations.author`. For array kinds only the elements
    /// selected by the filter's clauses on the container are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find(
        &self,
        kind: KindId,
        filter: &Filter,
        options: &FindOptions,
    ) -> CoreResult<Vec<Entity>> {
        ops::find(self, kind, filter, options)
    }

    /// Sets fields on a stored entity and on the instance.
    ///
    /// With [`MapperConfig::validate_on_update`] off, a nested entity's
    /// key field may change and the instance takes the new key.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` when a key field would change (a primary key
    ///   never may)
    /// - `Validation` when a required field or an element key would
    ///   become null
    /// - `NotFound` when the entity is no longer stored
    pub fn update(&self, entity: &mut Entity, fields: Document) -> CoreResult<()> {
        ops::update(self, entity, fields)
    }

    /// Appends `value` to the list attribute `attr`.
    ///
    /// # Errors
    ///
    /// - `Conflict` when another writer changed the list of an array
    ///   element since this instance was read
    /// - `NotFound` when the entity is no longer stored
    pub fn array_append(
        &self,
        entity: &mut Entity,
        attr: &str,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        ops::array_append(self, entity, attr, value.into())
    }

    /// Removes every occurrence of `value` from the list attribute `attr`.
    ///
    /// # Errors
    ///
    /// Returns `ValueNotInArray` (and writes nothing) when the value is
    /// not in the list, plus the errors of [`Mapper::array_append`].
    pub fn array_del(
        &self,
        entity: &mut Entity,
        attr: &str,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        ops::array_del(self, entity, attr, &value.into())
    }

    /// Deletes an entity: removes a top-level record, unsets an embedded
    /// sub-document or pulls an array element.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when there was nothing to delete.
    pub fn delete(&self, entity: Entity) -> CoreResult<()> {
        ops::delete(self, &entity)
    }

    /// Resolves link `attr` of `entity`, caching the result on the
    /// instance. Later calls return the cache without store access.
    ///
    /// # Errors
    ///
    /// - `MissingLink` when the link has no data and no sentinel
    /// - `NotFound` when a single-key link's target is gone
    /// - `InvalidOperation` when the kind declares no such link
    pub fn resolve<'a>(&'a self, entity: &'a mut Entity, attr: &str) -> CoreResult<&'a Resolved> {
        let kind = self.registry.kind(entity.kind())?;
        let spec = kind.link(attr).ok_or_else(|| {
            CoreError::invalid_operation(format!("{} has no link {attr}", kind.name()))
        })?;
        if !entity.is_resolved(attr) {
            match resolve_link(self, entity, attr, spec)? {
                Some(resolved) => entity.store_resolved(attr, resolved),
                None => {
                    return spec
                        .missing()
                        .ok_or_else(|| CoreError::missing_link(kind.name(), attr))
                }
            }
        }
        entity.resolved(attr).ok_or_else(|| {
            CoreError::invalid_operation(format!("{}.{attr} did not cache", kind.name()))
        })
    }

    /// Fetches an entity by natural key, creating it from `source` when
    /// absent. See [`ExternalSource`].
    ///
    /// # Errors
    ///
    /// - `ExternalSource` when the source fails
    /// - `InvalidOperation` for kinds whose keys the store generates
    /// - the errors of [`Mapper::insert`]
    pub fn get_or_create(
        &self,
        kind: KindId,
        key: impl Into<Key>,
        parent: Option<EntityRef>,
        source: &dyn ExternalSource,
    ) -> CoreResult<Entity> {
        get_or_create::get_or_create(self, kind, key.into(), parent, source)
    }

    /// Natural keys of an embedded or unique-array kind held by more than
    /// one parent record, with those parents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for other kinds.
    pub fn duplicates(&self, kind: KindId) -> CoreResult<BTreeMap<Key, Vec<EntityRef>>> {
        ops::duplicates(self, kind)
    }
}
