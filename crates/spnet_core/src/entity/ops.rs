//! Store operations for the four entity shapes.
//!
//! Each function dispatches on the kind's topology and turns one mapper
//! call into (at most) one store write scoped by the kind's field path.

use super::Entity;
use crate::error::{CoreError, CoreResult};
use crate::field_path::FieldPath;
use crate::mapper::{Mapper, NewEntity};
use crate::registry::KindId;
use crate::schema::Kind;
use crate::types::{EntityRef, Key, KeyPolicy, Lookup, Topology};
use spnet_store::{Filter, FindOptions, Projection, PullMatch};
use spnet_value::{Document, Value, ID_FIELD};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Brings a lookup key into the stored form of `kind`'s primary keys.
fn primary_key(kind: &Kind, key: &Key) -> CoreResult<Key> {
    kind.key_policy()
        .normalize(key)
        .ok_or_else(|| CoreError::not_found(kind.name(), key))
}

fn parent_kind<'m>(mapper: &'m Mapper, kind: &Kind) -> CoreResult<&'m Kind> {
    let parent = kind.parent().ok_or_else(|| {
        CoreError::invalid_operation(format!("{} is not a nested kind", kind.name()))
    })?;
    mapper.registry().kind(parent)
}

/// `parent` with its key in the stored form of the parent kind's keys.
fn parent_ref(mapper: &Mapper, kind: &Kind, parent: EntityRef) -> CoreResult<EntityRef> {
    let owner = parent_kind(mapper, kind)?;
    let key = owner
        .key_policy()
        .normalize(&parent.key)
        .ok_or_else(|| CoreError::not_found(owner.name(), &parent.key))?;
    Ok(EntityRef::new(parent.collection, key))
}

/// The `_id` of a fetched parent record, as a reference.
fn record_ref(kind: &Kind, record: &Document) -> CoreResult<EntityRef> {
    let key = record.id().and_then(Key::from_value).ok_or_else(|| {
        CoreError::invalid_operation(format!("{} record without a usable _id", kind.collection()))
    })?;
    Ok(EntityRef::new(kind.collection(), key))
}

fn container_projection(path: &FieldPath) -> Projection {
    Projection::new([path.container()])
}

fn find_element<'d>(record: &'d Document, path: &FieldPath, key: &Key) -> Option<&'d Document> {
    record
        .get(path.container())?
        .as_array()?
        .iter()
        .filter_map(Value::as_map)
        .find(|element| element.get(path.key_field()).and_then(Key::from_value).as_ref() == Some(key))
}

/// Fetches one entity of `kind_id`.
pub(crate) fn fetch(mapper: &Mapper, kind_id: KindId, lookup: Lookup) -> CoreResult<Entity> {
    let registry = mapper.registry();
    let kind = registry.kind(kind_id)?;
    let handle = mapper.handle(kind_id)?;
    trace!(kind = kind.name(), %lookup, "fetch");

    match (kind.topology(), lookup) {
        (Topology::TopLevel, Lookup::Key(key)) => {
            let key = primary_key(kind, &key)?;
            let raw = handle.fetch_one(&Filter::by_id(&key), None, &key)?;
            Entity::build(registry, kind_id, raw, None)
        }
        (Topology::Embedded, Lookup::Key(key)) => {
            let path = kind.field_path()?;
            let record = handle.fetch_one(
                &Filter::new().eq(path.key_path(), &key),
                Some(&container_projection(path)),
                &key,
            )?;
            let parent = record_ref(kind, &record)?;
            let raw = record
                .get(path.container())
                .and_then(Value::as_map)
                .cloned()
                .ok_or_else(|| CoreError::not_found(kind.name(), &key))?;
            Entity::build(registry, kind_id, raw, Some(parent))
        }
        (Topology::UniqueArrayElement, Lookup::Key(key)) => {
            let path = kind.field_path()?;
            let record = handle.fetch_one(
                &Filter::new().eq(path.key_path(), &key),
                Some(&container_projection(path)),
                &key,
            )?;
            let parent = record_ref(kind, &record)?;
            let raw = find_element(&record, path, &key)
                .cloned()
                .ok_or_else(|| CoreError::not_found(kind.name(), &key))?;
            Entity::build(registry, kind_id, raw, Some(parent))
        }
        (Topology::ArrayElement | Topology::UniqueArrayElement, Lookup::Element { parent, key }) => {
            let path = kind.field_path()?;
            let owner = parent_kind(mapper, kind)?;
            let not_found = || CoreError::not_found(kind.name(), format!("({parent}, {key})"));
            let parent_key = owner.key_policy().normalize(&parent).ok_or_else(not_found)?;
            let record = handle
                .find_one(&Filter::by_id(&parent_key), Some(&container_projection(path)))?
                .ok_or_else(not_found)?;
            let raw = find_element(&record, path, &key)
                .cloned()
                .ok_or_else(not_found)?;
            let parent = EntityRef::new(kind.collection(), parent_key);
            Entity::build(registry, kind_id, raw, Some(parent))
        }
        (Topology::ArrayElement, Lookup::Key(key)) => Err(CoreError::invalid_operation(format!(
            "{} {key} can only be fetched together with its parent key",
            kind.name()
        ))),
        (_, lookup @ Lookup::Element { .. }) => Err(CoreError::invalid_operation(format!(
            "{} is not an array kind; cannot look up {lookup}",
            kind.name()
        ))),
    }
}

/// The lookup that finds what `new` would insert.
pub(crate) fn lookup_for(kind: &Kind, new: &NewEntity) -> CoreResult<Lookup> {
    let field = kind.path().map_or(ID_FIELD, FieldPath::key_field);
    let key = new
        .key
        .clone()
        .or_else(|| new.data.get(field).and_then(Key::from_value))
        .ok_or_else(|| CoreError::validation(kind.name(), field))?;
    match kind.topology() {
        Topology::ArrayElement => {
            let parent = new.parent.as_ref().ok_or_else(|| {
                CoreError::invalid_operation(format!("{} needs a parent record", kind.name()))
            })?;
            Ok(Lookup::Element {
                parent: parent.key.clone(),
                key,
            })
        }
        _ => Ok(Lookup::Key(key)),
    }
}

/// Inserts `new` as an entity of `kind_id`.
pub(crate) fn insert(mapper: &Mapper, kind_id: KindId, new: NewEntity) -> CoreResult<Entity> {
    let registry = mapper.registry();
    let kind = registry.kind(kind_id)?;
    let handle = mapper.handle(kind_id)?;
    let NewEntity {
        key,
        mut data,
        parent,
        links,
    } = new;

    let mut cached = Vec::new();
    for (attr, value) in links {
        let (raw, resolved) = value.split()?;
        data.insert(attr.as_str(), raw);
        if let Some(resolved) = resolved {
            cached.push((attr, resolved));
        }
    }
    if let Some(key) = key {
        data.insert(kind.path().map_or(ID_FIELD, FieldPath::key_field), key.to_value());
    }
    if let Some(field) = kind.missing_required(&data) {
        return Err(CoreError::validation(kind.name(), field));
    }
    let parent = match parent {
        Some(parent) if kind.topology().is_nested() => Some(parent_ref(mapper, kind, parent)?),
        parent => parent,
    };
    trace!(kind = kind.name(), "insert");

    let mut entity = match kind.topology() {
        Topology::TopLevel => {
            let policy = kind.key_policy();
            match data
                .id()
                .map(|id| Key::from_value(id).and_then(|key| policy.normalize(&key)))
            {
                Some(Some(key)) => {
                    data.insert(ID_FIELD, key.to_value());
                }
                Some(None) => return Err(CoreError::validation(kind.name(), ID_FIELD)),
                None if policy == KeyPolicy::Supplied => {
                    return Err(CoreError::validation(kind.name(), ID_FIELD))
                }
                None => {}
            }
            let key = handle.insert(data.clone())?;
            data.insert(ID_FIELD, key.to_value());
            Entity::build(registry, kind_id, data, None)?
        }
        Topology::Embedded => {
            let path = kind.field_path()?;
            let parent = match parent {
                Some(parent) => {
                    let result = handle.set_fields(
                        &Filter::by_id(&parent.key),
                        vec![(path.container().to_string(), Value::Map(data.clone()))],
                    )?;
                    if result.matched == 0 {
                        return Err(CoreError::not_found(parent_kind(mapper, kind)?.name(), &parent.key));
                    }
                    parent
                }
                None => synthesize_parent(mapper, kind, Value::Map(data.clone()), &data)?,
            };
            Entity::build(registry, kind_id, data, Some(parent))?
        }
        topology => {
            let path = kind.field_path()?;
            let key = data
                .get(path.key_field())
                .and_then(Key::from_value)
                .ok_or_else(|| CoreError::validation(kind.name(), path.key_field()))?;
            let parent = match parent {
                Some(parent) => {
                    push_element(mapper, kind, path, &parent, &key, &data)?;
                    parent
                }
                None if topology == Topology::UniqueArrayElement => synthesize_parent(
                    mapper,
                    kind,
                    Value::Array(vec![Value::Map(data.clone())]),
                    &data,
                )?,
                None => {
                    return Err(CoreError::invalid_operation(format!(
                        "{} needs a parent record",
                        kind.name()
                    )))
                }
            };
            Entity::build(registry, kind_id, data, Some(parent))?
        }
    };

    for (attr, resolved) in cached {
        entity.store_resolved(&attr, resolved);
    }
    Ok(entity)
}

/// Inserts a new parent record that already holds `contained` in the
/// kind's container, so the pair is written at once.
fn synthesize_parent(
    mapper: &Mapper,
    kind: &Kind,
    contained: Value,
    data: &Document,
) -> CoreResult<EntityRef> {
    let owner = parent_kind(mapper, kind)?;
    let path = kind.field_path()?;
    let mut record = kind.seed_parent(data);
    record.insert(path.container(), contained);
    if let Some(field) = owner.missing_required(&record) {
        return Err(CoreError::validation(owner.name(), field));
    }
    let key = mapper.handle(kind.id())?.insert(record)?;
    Ok(EntityRef::new(kind.collection(), key))
}

/// Appends an element unless the parent already holds its key.
fn push_element(
    mapper: &Mapper,
    kind: &Kind,
    path: &FieldPath,
    parent: &EntityRef,
    key: &Key,
    data: &Document,
) -> CoreResult<()> {
    let handle = mapper.handle(kind.id())?;
    let guarded = Filter::by_id(&parent.key).ne(path.key_path(), key);
    let result = handle.push(&guarded, path.container(), Value::Map(data.clone()))?;
    if result.matched > 0 {
        return Ok(());
    }
    let exists = handle
        .find_one(&Filter::by_id(&parent.key), Some(&Projection::new([ID_FIELD])))?
        .is_some();
    if exists {
        Err(CoreError::duplicate_key(kind.name(), key))
    } else {
        Err(CoreError::not_found(parent_kind(mapper, kind)?.name(), &parent.key))
    }
}

/// A filter selecting the record that holds `entity`, narrowed to its
/// element for array kinds so positional paths address it. Nested
/// entities only match while their sub-document is still stored.
fn holder_filter(kind: &Kind, entity: &Entity) -> CoreResult<Filter> {
    let filter = Filter::by_id(&entity.record_ref().key);
    match entity {
        Entity::TopLevel(_) => Ok(filter),
        Entity::Embedded(_) => {
            let path = kind.field_path()?;
            Ok(match entity.key() {
                Some(key) => filter.eq(path.key_path(), key),
                None => filter.exists(path.container(), true),
            })
        }
        Entity::ArrayElem(_) | Entity::UniqueArrayElem(_) => {
            Ok(filter.eq(kind.field_path()?.key_path(), entity.key_value()))
        }
    }
}

fn describe(entity: &Entity) -> String {
    entity
        .key()
        .map_or_else(|| entity.record_ref().to_string(), ToString::to_string)
}

/// Sets `fields` on the stored entity and merges them into the instance.
pub(crate) fn update(mapper: &Mapper, entity: &mut Entity, fields: Document) -> CoreResult<()> {
    let registry = mapper.registry();
    let kind = registry.kind(entity.kind())?;
    let identity_field = kind.path().map_or(ID_FIELD, FieldPath::key_field);
    if let Some(value) = fields.get(identity_field) {
        if entity.get(identity_field) != Some(value) {
            if mapper.config().validate_on_update || entity.topology() == Topology::TopLevel {
                return Err(CoreError::invalid_operation(format!(
                    "{}.{identity_field} is the entity's key and cannot change",
                    kind.name()
                )));
            }
            if entity.topology().is_array() && Key::from_value(value).is_none() {
                return Err(CoreError::validation(kind.name(), identity_field));
            }
        }
    }
    if mapper.config().validate_on_update {
        for (field, value) in fields.iter() {
            if value.is_null() && kind.required().iter().any(|r| r == field) {
                return Err(CoreError::validation(kind.name(), field.as_str()));
            }
        }
    }
    if fields.is_empty() {
        return Ok(());
    }

    let filter = holder_filter(kind, entity)?;
    let pairs = fields
        .iter()
        .map(|(field, value)| {
            let path = match (entity.topology(), kind.path()) {
                (Topology::Embedded, Some(path)) => path.nested(field),
                (topology, Some(path)) if topology.is_array() => path.positional(field),
                _ => field.clone(),
            };
            (path, value.clone())
        })
        .collect();
    trace!(kind = kind.name(), key = %describe(entity), "update");
    let result = mapper.handle(entity.kind())?.set_fields(&filter, pairs)?;
    if result.matched == 0 {
        return Err(CoreError::not_found(kind.name(), describe(entity)));
    }
    for (field, value) in fields {
        entity.set_field(registry, &field, value)?;
    }
    Ok(())
}

fn current_list(kind: &Kind, entity: &Entity, attr: &str) -> CoreResult<Vec<Value>> {
    match entity.get(attr) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(CoreError::invalid_operation(format!(
            "{}.{attr} holds {}, not an array",
            kind.name(),
            other.type_name()
        ))),
    }
}

/// Appends `value` to the list attribute `attr`.
pub(crate) fn array_append(
    mapper: &Mapper,
    entity: &mut Entity,
    attr: &str,
    value: Value,
) -> CoreResult<()> {
    let registry = mapper.registry();
    let kind = registry.kind(entity.kind())?;
    let mut list = current_list(kind, entity, attr)?;
    list.push(value.clone());

    match entity.topology() {
        Topology::TopLevel | Topology::Embedded => {
            let field = match kind.path() {
                Some(path) => path.nested(attr),
                None => attr.to_string(),
            };
            let filter = holder_filter(kind, entity)?;
            let result = mapper.handle(entity.kind())?.push(&filter, &field, value)?;
            if result.matched == 0 {
                return Err(CoreError::not_found(kind.name(), describe(entity)));
            }
        }
        _ => write_list(mapper, kind, entity, attr, list.clone())?,
    }
    entity.set_field(registry, attr, Value::Array(list))
}

/// Removes every occurrence of `value` from the list attribute `attr`.
pub(crate) fn array_del(
    mapper: &Mapper,
    entity: &mut Entity,
    attr: &str,
    value: &Value,
) -> CoreResult<()> {
    let registry = mapper.registry();
    let kind = registry.kind(entity.kind())?;
    let mut list = current_list(kind, entity, attr)?;
    let before = list.len();
    list.retain(|item| item != value);
    if list.len() == before {
        return Err(CoreError::value_not_in_array(kind.name(), attr));
    }

    match entity.topology() {
        Topology::TopLevel | Topology::Embedded => {
            let field = match kind.path() {
                Some(path) => path.nested(attr),
                None => attr.to_string(),
            };
            let filter = holder_filter(kind, entity)?;
            let result = mapper.handle(entity.kind())?.pull(
                &filter,
                &field,
                PullMatch::Equal(value.clone()),
            )?;
            if result.matched == 0 {
                return Err(CoreError::not_found(kind.name(), describe(entity)));
            }
            if result.modified == 0 {
                return Err(CoreError::value_not_in_array(kind.name(), attr));
            }
        }
        _ => write_list(mapper, kind, entity, attr, list.clone())?,
    }
    entity.set_field(registry, attr, Value::Array(list))
}

/// Replaces a list attribute of an array element with one positional
/// write. With optimistic writes on, the write only lands if the stored
/// list still equals the one this instance last saw.
fn write_list(
    mapper: &Mapper,
    kind: &Kind,
    entity: &Entity,
    attr: &str,
    list: Vec<Value>,
) -> CoreResult<()> {
    let path = kind.field_path()?;
    let parent = &entity.record_ref().key;
    let key = entity.key_value();
    let handle = mapper.handle(entity.kind())?;

    let mut element = Filter::new().eq(path.key_field(), key.clone());
    if mapper.config().optimistic_array_writes {
        element = match entity.get(attr) {
            Some(seen) => element.eq(attr, seen.clone()),
            None => element.exists(attr, false),
        };
    }
    let filter = Filter::by_id(parent).elem_match(path.container(), element);
    let result = handle.set_fields(&filter, vec![(path.positional(attr), Value::Array(list))])?;
    if result.matched > 0 {
        return Ok(());
    }

    let present = Filter::by_id(parent)
        .elem_match(path.container(), Filter::new().eq(path.key_field(), key));
    if handle.find_one(&present, Some(&Projection::new([ID_FIELD])))?.is_some() {
        Err(CoreError::conflict(kind.name(), describe(entity)))
    } else {
        Err(CoreError::not_found(kind.name(), describe(entity)))
    }
}

/// Deletes `entity` from the store.
pub(crate) fn delete(mapper: &Mapper, entity: &Entity) -> CoreResult<()> {
    let kind = mapper.registry().kind(entity.kind())?;
    let handle = mapper.handle(entity.kind())?;
    let holder = Filter::by_id(&entity.record_ref().key);
    trace!(kind = kind.name(), key = %describe(entity), "delete");

    let removed = match entity.topology() {
        Topology::TopLevel => handle.remove(&holder)?,
        Topology::Embedded => {
            let path = kind.field_path()?;
            let filter = holder_filter(kind, entity)?;
            handle.unset(&filter, vec![path.container().to_string()])?.modified > 0
        }
        _ => {
            let path = kind.field_path()?;
            let element = Filter::new().eq(path.key_field(), entity.key_value());
            handle
                .pull(&holder, path.container(), PullMatch::Matching(element))?
                .modified
                > 0
        }
    };
    if removed {
        Ok(())
    } else {
        Err(CoreError::not_found(kind.name(), describe(entity)))
    }
}

/// Entities of `kind_id` selected by `filter`.
///
/// Filters address the stored records: nested kinds query their parent
/// collection with paths like `recommendations.author`. For array kinds,
/// only the elements satisfying the filter's clauses on the container
/// are returned.
pub(crate) fn find(
    mapper: &Mapper,
    kind_id: KindId,
    filter: &Filter,
    options: &FindOptions,
) -> CoreResult<Vec<Entity>> {
    let registry = mapper.registry();
    let kind = registry.kind(kind_id)?;
    let handle = mapper.handle(kind_id)?;

    let Some(path) = kind.path() else {
        return handle
            .fetch_many(filter, options)?
            .into_iter()
            .map(|raw| Entity::build(registry, kind_id, raw, None))
            .collect();
    };

    let options = options.clone().projection(container_projection(path));
    let mut found = Vec::new();
    for record in handle.fetch_many(filter, &options)? {
        let parent = record_ref(kind, &record)?;
        let Some(contained) = record.get(path.container()) else {
            continue;
        };
        if kind.topology() == Topology::Embedded {
            if let Value::Map(raw) = contained {
                found.push(Entity::build(registry, kind_id, raw.clone(), Some(parent)))
            }
            continue;
        }
        let narrowed = filter.addresses(path.container());
        for element in contained.as_array().unwrap_or_default() {
            if narrowed && !filter.element_matches(path.container(), element) {
                continue;
            }
            match element.as_map() {
                Some(raw) if raw.get(path.key_field()).and_then(Key::from_value).is_some() => {
                    found.push(Entity::build(registry, kind_id, raw.clone(), Some(parent.clone())));
                }
                _ => warn!(kind = kind.name(), "skipping array element without a key"),
            }
        }
    }
    found.into_iter().collect()
}

/// Natural keys of `kind_id` held by more than one parent record.
pub(crate) fn duplicates(
    mapper: &Mapper,
    kind_id: KindId,
) -> CoreResult<BTreeMap<Key, Vec<EntityRef>>> {
    let kind = mapper.registry().kind(kind_id)?;
    if !matches!(kind.topology(), Topology::Embedded | Topology::UniqueArrayElement) {
        return Err(CoreError::invalid_operation(format!(
            "{} keys are not unique across the collection",
            kind.name()
        )));
    }
    let path = kind.field_path()?;
    let records = mapper.handle(kind_id)?.fetch_many(
        &Filter::new().exists(path.key_path(), true),
        &FindOptions::new().projection(container_projection(path)),
    )?;

    let mut holders: BTreeMap<Key, Vec<EntityRef>> = BTreeMap::new();
    for record in &records {
        let parent = record_ref(kind, record)?;
        let mut keys: Vec<Key> = match record.get(path.container()) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.get(path.key_field()).and_then(Key::from_value))
                .collect(),
            Some(other) => other.get(path.key_field()).and_then(Key::from_value).into_iter().collect(),
            None => Vec::new(),
        };
        keys.sort();
        keys.dedup();
        for key in keys {
            holders.entry(key).or_default().push(parent.clone());
        }
    }
    holders.retain(|_, parents| parents.len() > 1);
    Ok(holders)
}

/// Runs `insert`, turning a lost insert race into a fetch of the winner.
pub(crate) fn insert_or_fetch(
    mapper: &Mapper,
    kind_id: KindId,
    new: NewEntity,
    lookup: Lookup,
) -> CoreResult<Entity> {
    match insert(mapper, kind_id, new) {
        Err(err) if err.is_duplicate_key() && mapper.config().retry_duplicate_as_fetch => {
            debug!(%lookup, "insert lost a race; fetching the stored entity");
            fetch(mapper, kind_id, lookup)
        }
        other => other,
    }
}
