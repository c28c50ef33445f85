//! Lazy relationships between entities.
//!
//! A link attribute holds either raw link data (a key or a list of keys
//! as stored in the record) or nothing at all (reverse-query and
//! parent links). [`Mapper::resolve`](crate::Mapper::resolve) turns it
//! into entities once and caches the result on the owning instance.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::mapper::Mapper;
use crate::registry::KindId;
use crate::types::{Key, Lookup};
use spnet_store::{Filter, FindOptions};
use spnet_value::Value;
use std::fmt;
use std::sync::Arc;

/// Builds the filter of a reverse-query link from the owning entity.
pub type ReverseQuery = Arc<dyn Fn(&Entity) -> Filter + Send + Sync>;

/// The result of resolving a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A single entity.
    One(Box<Entity>),
    /// Entities in link order; `None` where a key matched nothing.
    Many(Vec<Option<Entity>>),
    /// No entity (only ever a missing-data sentinel).
    Absent,
}

impl Resolved {
    /// The single entity, if this is [`Resolved::One`].
    #[must_use]
    pub fn one(&self) -> Option<&Entity> {
        match self {
            Resolved::One(entity) => Some(entity.as_ref()),
            _ => None,
        }
    }

    /// The entity slots, if this is [`Resolved::Many`].
    #[must_use]
    pub fn many(&self) -> Option<&[Option<Entity>]> {
        match self {
            Resolved::Many(entities) => Some(entities.as_slice()),
            _ => None,
        }
    }

    /// Every resolved entity, skipping placeholders.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        let (one, many): (Option<&Entity>, &[Option<Entity>]) = match self {
            Resolved::One(entity) => (Some(entity.as_ref()), &[]),
            Resolved::Many(entities) => (None, entities.as_slice()),
            Resolved::Absent => (None, &[]),
        };
        one.into_iter().chain(many.iter().flatten())
    }
}

/// How a link finds its targets.
#[derive(Clone)]
pub enum Strategy {
    /// The attribute holds one key of the target kind.
    ByKey(KindId),
    /// The attribute holds a list of keys of the target kind.
    ByKeyList(KindId),
    /// A query on the target kind built from the owning entity.
    ByReverseQuery {
        /// Target kind.
        target: KindId,
        /// Filter builder.
        query: ReverseQuery,
    },
    /// The owning record of a nested entity.
    ByParentRef,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::ByKey(target) => f.debug_tuple("ByKey").field(target).finish(),
            Strategy::ByKeyList(target) => f.debug_tuple("ByKeyList").field(target).finish(),
            Strategy::ByReverseQuery { target, .. } => f
                .debug_struct("ByReverseQuery")
                .field("target", target)
                .finish_non_exhaustive(),
            Strategy::ByParentRef => f.write_str("ByParentRef"),
        }
    }
}

impl Strategy {
    /// Whether the link's data is stored in the owning record.
    #[must_use]
    pub fn stores_data(&self) -> bool {
        matches!(self, Strategy::ByKey(_) | Strategy::ByKeyList(_))
    }
}

/// A link declared on a registered kind.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub(crate) strategy: Strategy,
    pub(crate) missing: Option<Resolved>,
}

impl LinkSpec {
    /// Resolution strategy.
    #[must_use]
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Sentinel returned when the link has no data.
    #[must_use]
    pub fn missing(&self) -> Option<&Resolved> {
        self.missing.as_ref()
    }
}

#[derive(Clone)]
pub(crate) enum TargetDef {
    ByKey(String),
    ByKeyList(String),
    ByReverseQuery(String, ReverseQuery),
    ByParentRef,
}

/// Declaration of a link, naming its target kind.
///
/// ```rust
/// use spnet_core::{LinkDef, Resolved};
/// use spnet_store::Filter;
///
/// let authors = LinkDef::by_key_list("Person");
/// let issues = LinkDef::by_reverse_query("Issue", |paper| {
///     Filter::new().eq("paper", paper.key_value())
/// })
/// .missing(Resolved::Many(Vec::new()));
/// # let _ = (authors, issues);
/// ```
#[derive(Clone)]
pub struct LinkDef {
    pub(crate) target: TargetDef,
    pub(crate) missing: Option<Resolved>,
}

impl fmt::Debug for LinkDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            TargetDef::ByKey(name) => format!("ByKey({name})"),
            TargetDef::ByKeyList(name) => format!("ByKeyList({name})"),
            TargetDef::ByReverseQuery(name, _) => format!("ByReverseQuery({name})"),
            TargetDef::ByParentRef => "ByParentRef".to_string(),
        };
        f.debug_struct("LinkDef")
            .field("target", &target)
            .field("missing", &self.missing)
            .finish()
    }
}

impl LinkDef {
    fn new(target: TargetDef) -> Self {
        Self {
            target,
            missing: None,
        }
    }

    /// A link holding one key of `target`.
    #[must_use]
    pub fn by_key(target: &str) -> Self {
        Self::new(TargetDef::ByKey(target.to_string()))
    }

    /// A link holding a list of keys of `target`.
    #[must_use]
    pub fn by_key_list(target: &str) -> Self {
        Self::new(TargetDef::ByKeyList(target.to_string()))
    }

    /// A link answered by querying `target` with a filter built from the
    /// owning entity.
    #[must_use]
    pub fn by_reverse_query<F>(target: &str, query: F) -> Self
    where
        F: Fn(&Entity) -> Filter + Send + Sync + 'static,
    {
        Self::new(TargetDef::ByReverseQuery(target.to_string(), Arc::new(query)))
    }

    /// The owning record of a nested entity.
    #[must_use]
    pub fn by_parent_ref() -> Self {
        Self::new(TargetDef::ByParentRef)
    }

    /// Returns `sentinel` instead of failing when the link has no data.
    #[must_use]
    pub fn missing(mut self, sentinel: Resolved) -> Self {
        self.missing = Some(sentinel);
        self
    }
}

/// Per-instance state of one link attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    raw: Option<Value>,
    resolved: Option<Resolved>,
}

impl Link {
    pub(crate) fn unresolved(raw: Value) -> Self {
        Self {
            raw: Some(raw),
            resolved: None,
        }
    }

    pub(crate) fn with_resolved(raw: Option<Value>, resolved: Resolved) -> Self {
        Self {
            raw,
            resolved: Some(resolved),
        }
    }

    /// The stored link data.
    #[must_use]
    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    /// The cached resolution.
    #[must_use]
    pub fn resolved(&self) -> Option<&Resolved> {
        self.resolved.as_ref()
    }

    pub(crate) fn cache(&mut self, resolved: Resolved) {
        self.resolved = Some(resolved);
    }
}

/// A new value for a link attribute.
#[derive(Debug, Clone)]
pub enum LinkValue {
    /// A raw key; resolution happens later.
    Key(Value),
    /// A raw key list; resolution happens later.
    Keys(Vec<Value>),
    /// An already-fetched entity; its key is stored and it is cached.
    Entity(Box<Entity>),
    /// Already-fetched entities; their keys are stored and they are cached.
    Entities(Vec<Entity>),
}

impl From<Entity> for LinkValue {
    fn from(entity: Entity) -> Self {
        LinkValue::Entity(Box::new(entity))
    }
}

impl From<Vec<Entity>> for LinkValue {
    fn from(entities: Vec<Entity>) -> Self {
        LinkValue::Entities(entities)
    }
}

impl From<Key> for LinkValue {
    fn from(key: Key) -> Self {
        LinkValue::Key(key.to_value())
    }
}

impl LinkValue {
    /// The data to store and, for entities, the resolution to cache.
    pub(crate) fn split(self) -> CoreResult<(Value, Option<Resolved>)> {
        fn stored_key(entity: &Entity) -> CoreResult<Value> {
            entity.key().map(Key::to_value).ok_or_else(|| {
                CoreError::invalid_operation("cannot link to an entity without a key")
            })
        }
        match self {
            LinkValue::Key(raw) => Ok((raw, None)),
            LinkValue::Keys(raws) => Ok((Value::Array(raws), None)),
            LinkValue::Entity(entity) => {
                let raw = stored_key(&entity)?;
                Ok((raw, Some(Resolved::One(entity))))
            }
            LinkValue::Entities(entities) => {
                let raws = entities.iter().map(stored_key).collect::<CoreResult<Vec<_>>>()?;
                let slots = entities.into_iter().map(Some).collect();
                Ok((Value::Array(raws), Some(Resolved::Many(slots))))
            }
        }
    }
}

/// Resolves one link of `entity`. `Ok(None)` means the link has no data.
pub(crate) fn resolve_link(
    mapper: &Mapper,
    entity: &Entity,
    attr: &str,
    spec: &LinkSpec,
) -> CoreResult<Option<Resolved>> {
    match &spec.strategy {
        Strategy::ByKey(target) => {
            let Some(raw) = entity.link_data(attr).filter(|v| !v.is_null()) else {
                return Ok(None);
            };
            let key = key_of(mapper, *target, raw)?;
            let found = mapper.fetch(*target, Lookup::Key(key))?;
            Ok(Some(Resolved::One(Box::new(found))))
        }
        Strategy::ByKeyList(target) => {
            let Some(raw) = entity.link_data(attr).filter(|v| !v.is_null()) else {
                return Ok(None);
            };
            let keys: Vec<&Value> = match raw {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            let mut slots = Vec::with_capacity(keys.len());
            for raw_key in keys {
                let slot = match Key::from_value(raw_key) {
                    None => None,
                    Some(key) => match mapper.fetch(*target, Lookup::Key(key)) {
                        Ok(found) => Some(found),
                        Err(err) if err.is_not_found() => None,
                        Err(err) => return Err(err),
                    },
                };
                slots.push(slot);
            }
            Ok(Some(Resolved::Many(slots)))
        }
        Strategy::ByReverseQuery { target, query } => {
            let filter = query(entity);
            let found = mapper.find(*target, &filter, &FindOptions::new())?;
            Ok(Some(Resolved::Many(found.into_iter().map(Some).collect())))
        }
        Strategy::ByParentRef => {
            let parent = entity.parent().ok_or_else(|| {
                CoreError::invalid_operation(format!("{attr}: top-level entities have no parent"))
            })?;
            let kind = mapper.registry().kind(entity.kind())?;
            let parent_kind = kind.parent().ok_or_else(|| {
                CoreError::invalid_operation(format!("{} has no parent kind", kind.name()))
            })?;
            let found = mapper.fetch(parent_kind, Lookup::Key(parent.key.clone()))?;
            Ok(Some(Resolved::One(Box::new(found))))
        }
    }
}

fn key_of(mapper: &Mapper, target: KindId, raw: &Value) -> CoreResult<Key> {
    Key::from_value(raw).ok_or_else(|| {
        let name = mapper
            .registry()
            .kind(target)
            .map_or("entity", |kind| kind.name());
        CoreError::not_found(name, format!("{raw:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_value_conversions() {
        assert!(matches!(LinkValue::from(Key::from("t1")), LinkValue::Key(Value::Text(_))));
    }

    #[test]
    fn absent_resolution_yields_no_entities() {
        assert_eq!(Resolved::Absent.entities().count(), 0);
        assert_eq!(Resolved::Many(vec![None, None]).entities().count(), 0);
        assert!(Resolved::Many(Vec::new()).many().is_some_and(<[Option<Entity>]>::is_empty));
    }

    #[test]
    fn link_cache_starts_empty() {
        let link = Link::unresolved(Value::from("k"));
        assert_eq!(link.raw(), Some(&Value::from("k")));
        assert!(link.resolved().is_none());
    }
}
