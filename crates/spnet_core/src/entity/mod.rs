//! Typed entities over raw records.
//!
//! An [`Entity`] is one of four storage shapes (see [`Topology`]). Every
//! variant carries the last-synchronised raw field map and the typed
//! attributes decomposed from it; every mutation updates both together.
//! Nested variants also carry a reference to their parent record.

mod attrs;
mod identity;
pub(crate) mod ops;

pub use attrs::Attr;
pub use identity::Identity;

use crate::error::{CoreError, CoreResult};
use crate::link::{Link, LinkValue, Resolved};
use crate::registry::{KindId, Registry};
use crate::types::{EntityRef, Key, Topology};
use attrs::Attrs;
use spnet_value::{Document, Value};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
struct Record {
    kind: KindId,
    raw: Document,
    attrs: Attrs,
}

/// A top-level record.
#[derive(Debug, Clone)]
pub struct TopLevelDoc {
    record: Record,
    reference: EntityRef,
}

/// A sub-document under one field of a parent record.
#[derive(Debug, Clone)]
pub struct EmbeddedDoc {
    record: Record,
    parent: EntityRef,
    natural_key: Option<Key>,
}

/// One element of a parent's array field.
#[derive(Debug, Clone)]
pub struct ElementDoc {
    record: Record,
    parent: EntityRef,
    key: Key,
}

/// An entity instance.
#[derive(Debug, Clone)]
pub enum Entity {
    /// One record per entity.
    TopLevel(TopLevelDoc),
    /// A sub-document of a parent record.
    Embedded(EmbeddedDoc),
    /// An array element unique within its parent.
    ArrayElem(ElementDoc),
    /// An array element unique across the collection.
    UniqueArrayElem(ElementDoc),
}

impl Entity {
    /// Builds an entity of `kind` from raw data. Nested kinds need their
    /// parent reference; top-level kinds take their key from `_id`.
    pub(crate) fn build(
        registry: &Registry,
        kind: KindId,
        raw: Document,
        parent: Option<EntityRef>,
    ) -> CoreResult<Self> {
        let spec = registry.kind(kind)?;
        let nested_parent = || {
            parent.clone().ok_or_else(|| {
                CoreError::invalid_operation(format!("{} needs a parent record", spec.name()))
            })
        };

        match spec.topology() {
            Topology::TopLevel => {
                let key = raw
                    .id()
                    .and_then(Key::from_value)
                    .ok_or_else(|| CoreError::validation(spec.name(), spnet_value::ID_FIELD))?;
                let reference = EntityRef::new(spec.collection(), key);
                let attrs = Attrs::build(registry, spec, Some(&reference), &raw)?;
                Ok(Entity::TopLevel(TopLevelDoc {
                    record: Record { kind, raw, attrs },
                    reference,
                }))
            }
            Topology::Embedded => {
                let parent = nested_parent()?;
                let key_field = spec.field_path()?.key_field();
                let natural_key = raw.get(key_field).and_then(Key::from_value);
                let attrs = Attrs::build(registry, spec, None, &raw)?;
                Ok(Entity::Embedded(EmbeddedDoc {
                    record: Record { kind, raw, attrs },
                    parent,
                    natural_key,
                }))
            }
            topology => {
                let parent = nested_parent()?;
                let key_field = spec.field_path()?.key_field();
                let key = raw
                    .get(key_field)
                    .and_then(Key::from_value)
                    .ok_or_else(|| CoreError::validation(spec.name(), key_field))?;
                let attrs = Attrs::build(registry, spec, None, &raw)?;
                let element = ElementDoc {
                    record: Record { kind, raw, attrs },
                    parent,
                    key,
                };
                Ok(if topology == Topology::ArrayElement {
                    Entity::ArrayElem(element)
                } else {
                    Entity::UniqueArrayElem(element)
                })
            }
        }
    }

    fn record(&self) -> &Record {
        match self {
            Entity::TopLevel(doc) => &doc.record,
            Entity::Embedded(doc) => &doc.record,
            Entity::ArrayElem(doc) | Entity::UniqueArrayElem(doc) => &doc.record,
        }
    }

    fn record_mut(&mut self) -> &mut Record {
        match self {
            Entity::TopLevel(doc) => &mut doc.record,
            Entity::Embedded(doc) => &mut doc.record,
            Entity::ArrayElem(doc) | Entity::UniqueArrayElem(doc) => &mut doc.record,
        }
    }

    /// The entity's kind.
    #[must_use]
    pub fn kind(&self) -> KindId {
        self.record().kind
    }

    /// The entity's storage shape.
    #[must_use]
    pub fn topology(&self) -> Topology {
        match self {
            Entity::TopLevel(_) => Topology::TopLevel,
            Entity::Embedded(_) => Topology::Embedded,
            Entity::ArrayElem(_) => Topology::ArrayElement,
            Entity::UniqueArrayElem(_) => Topology::UniqueArrayElement,
        }
    }

    /// The last-synchronised raw field map.
    #[must_use]
    pub fn raw(&self) -> &Document {
        &self.record().raw
    }

    /// A raw field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.raw().get(field)
    }

    /// A decomposed attribute (declared scalars and unwrapped entities).
    #[must_use]
    pub fn attr(&self, field: &str) -> Option<&Attr> {
        self.record().attrs.fields.get(field)
    }

    /// Fields that are neither declared, unwrapped nor links.
    #[must_use]
    pub fn extra(&self) -> &Document {
        &self.record().attrs.extra
    }

    /// The embedded entity unwrapped from `field`.
    #[must_use]
    pub fn child(&self, field: &str) -> Option<&Entity> {
        match self.attr(field)? {
            Attr::Child(child) => Some(child.as_ref()),
            _ => None,
        }
    }

    /// The array-element entities unwrapped from `field`.
    #[must_use]
    pub fn children(&self, field: &str) -> &[Entity] {
        match self.attr(field) {
            Some(Attr::Children(children)) => children.as_slice(),
            _ => &[],
        }
    }

    /// The entity's own key: primary key for top-level entities, natural
    /// key for embedded ones (if they carry it), element key otherwise.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        match self {
            Entity::TopLevel(doc) => Some(&doc.reference.key),
            Entity::Embedded(doc) => doc.natural_key.as_ref(),
            Entity::ArrayElem(doc) | Entity::UniqueArrayElem(doc) => Some(&doc.key),
        }
    }

    /// The key as a stored value; null when there is none.
    #[must_use]
    pub fn key_value(&self) -> Value {
        self.key().map_or(Value::Null, Key::to_value)
    }

    /// The reference of a top-level entity.
    #[must_use]
    pub fn entity_ref(&self) -> Option<&EntityRef> {
        match self {
            Entity::TopLevel(doc) => Some(&doc.reference),
            _ => None,
        }
    }

    /// The owning record of a nested entity.
    #[must_use]
    pub fn parent(&self) -> Option<&EntityRef> {
        match self {
            Entity::TopLevel(_) => None,
            Entity::Embedded(doc) => Some(&doc.parent),
            Entity::ArrayElem(doc) | Entity::UniqueArrayElem(doc) => Some(&doc.parent),
        }
    }

    /// The record this entity is stored in: itself or its parent.
    #[must_use]
    pub fn record_ref(&self) -> &EntityRef {
        match self {
            Entity::TopLevel(doc) => &doc.reference,
            Entity::Embedded(doc) => &doc.parent,
            Entity::ArrayElem(doc) | Entity::UniqueArrayElem(doc) => &doc.parent,
        }
    }

    /// The entity's identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        match self {
            Entity::TopLevel(doc) => Identity::Document(doc.reference.clone()),
            Entity::Embedded(doc) => Identity::Embedded {
                parent: doc.parent.clone(),
                kind: doc.record.kind,
            },
            Entity::ArrayElem(doc) => Identity::Element {
                parent: doc.parent.clone(),
                kind: doc.record.kind,
                key: doc.key.clone(),
            },
            Entity::UniqueArrayElem(doc) => Identity::UniqueElement {
                kind: doc.record.kind,
                key: doc.key.clone(),
            },
        }
    }

    /// Reassigns link `attr` in memory.
    ///
    /// A raw key or key list drops any cached resolution; an entity (or
    /// list of entities) stores their keys and caches them as resolved.
    /// Persist the new link data with [`Mapper::update`](crate::Mapper::update).
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` when a linked entity has no key.
    pub fn assign_link(&mut self, attr: &str, value: impl Into<LinkValue>) -> CoreResult<()> {
        let (raw, resolved) = value.into().split()?;
        let record = self.record_mut();
        record.raw.insert(attr, raw.clone());
        record.attrs.fields.remove(attr);
        record.attrs.extra.remove(attr);
        let link = match resolved {
            Some(resolved) => Link::with_resolved(Some(raw), resolved),
            None => Link::unresolved(raw),
        };
        record.attrs.links.insert(attr.to_string(), link);
        Ok(())
    }

    /// The cached resolution of link `attr`.
    #[must_use]
    pub fn resolved(&self, attr: &str) -> Option<&Resolved> {
        self.record().attrs.links.get(attr).and_then(Link::resolved)
    }

    /// Whether link `attr` has a cached resolution.
    #[must_use]
    pub fn is_resolved(&self, attr: &str) -> bool {
        self.resolved(attr).is_some()
    }

    /// The stored data of link `attr`.
    #[must_use]
    pub fn link_data(&self, attr: &str) -> Option<&Value> {
        self.record().attrs.links.get(attr).and_then(Link::raw)
    }

    pub(crate) fn store_resolved(&mut self, attr: &str, resolved: Resolved) {
        self.record_mut().attrs.cache(attr, resolved);
    }

    /// Writes `value` to raw field `field` and re-derives its attribute.
    /// Writing a nested entity's key field moves its key along.
    pub(crate) fn set_field(
        &mut self,
        registry: &Registry,
        field: &str,
        value: Value,
    ) -> CoreResult<()> {
        let kind = registry.kind(self.kind())?;
        let owner = self.entity_ref().cloned();
        let moved_key = kind
            .path()
            .filter(|path| path.key_field() == field)
            .map(|_| Key::from_value(&value));
        let record = self.record_mut();
        record
            .attrs
            .assign(registry, kind, owner.as_ref(), field, &value)?;
        record.raw.insert(field, value);

        match (self, moved_key) {
            (Entity::Embedded(doc), Some(key)) => doc.natural_key = key,
            (Entity::ArrayElem(doc) | Entity::UniqueArrayElem(doc), Some(Some(key))) => {
                doc.key = key;
            }
            _ => {}
        }
        Ok(())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkDef;
    use crate::registry::RegistryBuilder;
    use crate::schema::KindSpec;
    use crate::types::KeyPolicy;
    use spnet_value::{doc, ObjectId};
    use std::collections::HashSet;

    fn registry() -> Registry {
        RegistryBuilder::new()
            .kind(KindSpec::top_level("Paper", "paper").required(["title"]))
            .kind(KindSpec::top_level("Person", "person"))
            .kind(KindSpec::top_level("Topic", "topic").key_policy(KeyPolicy::Supplied))
            .kind(KindSpec::embedded("Arxiv", "paper", "arxiv.id").fields(["title"]))
            .kind(
                KindSpec::array_element("Recommendation", "paper", "recommendations.author")
                    .fields(["text"]),
            )
            .link("Paper", "authors", LinkDef::by_key_list("Person"))
            .link("Recommendation", "author", LinkDef::by_key("Person"))
            .link("Recommendation", "sigs", LinkDef::by_key_list("Topic"))
            .unwrap("Paper", "arxiv", "Arxiv")
            .unwrap("Paper", "recommendations", "Recommendation")
            .build()
            .unwrap()
    }

    fn paper_id(registry: &Registry) -> KindId {
        registry.lookup("Paper").unwrap()
    }

    #[test]
    fn decomposes_top_level_record() {
        let registry = registry();
        let person = ObjectId::new();
        let id = ObjectId::new();
        let raw = doc! {
            "_id" => id,
            "title" => "boring article",
            "authors" => vec![Value::Id(person)],
            "venue" => "nowhere",
            "arxiv" => doc! { "id" => "1234.5678", "title" => "boring article" },
            "recommendations" => vec![
                Value::from(doc! { "author" => person, "text" => "must read" }),
                Value::from(doc! { "text" => "no author" }),
            ],
        };
        let paper = Entity::build(&registry, paper_id(&registry), raw, None).unwrap();

        assert_eq!(paper.key(), Some(&Key::Id(id)));
        assert_eq!(paper.attr("title").and_then(Attr::as_scalar), Some(&Value::from("boring article")));
        assert_eq!(paper.extra().get("venue"), Some(&Value::from("nowhere")));
        assert!(paper.attr("authors").is_none());
        assert!(paper.link_data("authors").is_some());
        assert!(!paper.is_resolved("authors"));

        let arxiv = paper.child("arxiv").unwrap();
        assert_eq!(arxiv.topology(), Topology::Embedded);
        assert_eq!(arxiv.key(), Some(&Key::from("1234.5678")));
        assert_eq!(arxiv.parent(), paper.entity_ref());

        let recs = paper.children("recommendations");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].key(), Some(&Key::Id(person)));
        assert_eq!(recs[0].link_data("author"), Some(&Value::Id(person)));
    }

    #[test]
    fn top_level_needs_id() {
        let registry = registry();
        let err = Entity::build(&registry, paper_id(&registry), doc! { "title" => "x" }, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "_id"));
    }

    #[test]
    fn element_needs_parent_and_key() {
        let registry = registry();
        let rec = registry.lookup("Recommendation").unwrap();
        let parent = EntityRef::new("paper", ObjectId::new());
        assert!(Entity::build(&registry, rec, doc! { "author" => "p" }, None).is_err());
        let err = Entity::build(&registry, rec, doc! { "text" => "t" }, Some(parent)).unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "author"));
    }

    #[test]
    fn equality_follows_identity() {
        let registry = registry();
        let id = ObjectId::new();
        let a = Entity::build(&registry, paper_id(&registry), doc! { "_id" => id, "title" => "a" }, None)
            .unwrap();
        let b = Entity::build(&registry, paper_id(&registry), doc! { "_id" => id, "title" => "b" }, None)
            .unwrap();
        assert_eq!(a, b);
        let set: HashSet<Entity> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn assigning_entities_caches_them() {
        let registry = registry();
        let topic_kind = registry.lookup("Topic").unwrap();
        let rec_kind = registry.lookup("Recommendation").unwrap();
        let topic = Entity::build(&registry, topic_kind, doc! { "_id" => "cosmology" }, None).unwrap();
        let parent = EntityRef::new("paper", ObjectId::new());
        let mut rec =
            Entity::build(&registry, rec_kind, doc! { "author" => "p1" }, Some(parent)).unwrap();

        rec.assign_link("sigs", vec![topic.clone()]).unwrap();
        assert_eq!(rec.get("sigs"), Some(&Value::from(vec!["cosmology"])));
        assert_eq!(rec.resolved("sigs").unwrap().entities().next(), Some(&topic));

        rec.assign_link("sigs", LinkValue::Keys(vec![Value::from("physics")])).unwrap();
        assert!(!rec.is_resolved("sigs"));
        assert_eq!(rec.link_data("sigs"), Some(&Value::from(vec!["physics"])));
    }

    #[test]
    fn set_field_reclassifies_and_drops_cache() {
        let registry = registry();
        let id = ObjectId::new();
        let mut paper =
            Entity::build(&registry, paper_id(&registry), doc! { "_id" => id, "title" => "a" }, None)
                .unwrap();
        paper.store_resolved("authors", Resolved::Many(Vec::new()));
        assert!(paper.is_resolved("authors"));

        paper
            .set_field(&registry, "authors", Value::Array(Vec::new()))
            .unwrap();
        assert!(!paper.is_resolved("authors"));

        paper
            .set_field(&registry, "arxiv", Value::from(doc! { "id" => "9" }))
            .unwrap();
        assert_eq!(paper.child("arxiv").and_then(Entity::key), Some(&Key::from("9")));
    }
}
