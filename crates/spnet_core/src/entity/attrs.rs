//! Decomposition of a raw record into typed attributes.

use super::Entity;
use crate::error::CoreResult;
use crate::link::{Link, Resolved};
use crate::registry::Registry;
use crate::schema::Kind;
use crate::types::{EntityRef, Key};
use spnet_value::{Document, Value, ID_FIELD};
use std::collections::BTreeMap;
use tracing::warn;

/// A decomposed attribute value.
#[derive(Debug, Clone)]
pub enum Attr {
    /// A declared scalar field.
    Scalar(Value),
    /// An embedded entity unwrapped from a sub-document.
    Child(Box<Entity>),
    /// Array-element entities unwrapped from an array field.
    Children(Vec<Entity>),
}

impl Attr {
    /// The scalar value, if this is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Attr::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// Typed attributes of one entity instance.
#[derive(Debug, Clone, Default)]
pub(crate) struct Attrs {
    pub(crate) fields: BTreeMap<String, Attr>,
    pub(crate) extra: Document,
    pub(crate) links: BTreeMap<String, Link>,
}

impl Attrs {
    pub(crate) fn build(
        registry: &Registry,
        kind: &Kind,
        owner: Option<&EntityRef>,
        raw: &Document,
    ) -> CoreResult<Self> {
        let mut attrs = Self::default();
        for (field, value) in raw.iter() {
            attrs.assign(registry, kind, owner, field, value)?;
        }
        Ok(attrs)
    }

    /// Classifies one field, replacing whatever it held before. A stored
    /// link that is reassigned loses its cached resolution.
    pub(crate) fn assign(
        &mut self,
        registry: &Registry,
        kind: &Kind,
        owner: Option<&EntityRef>,
        field: &str,
        value: &Value,
    ) -> CoreResult<()> {
        self.fields.remove(field);
        self.extra.remove(field);
        self.links.remove(field);

        if field == ID_FIELD {
            return Ok(());
        }
        if kind.link(field).is_some_and(|spec| spec.strategy().stores_data()) {
            self.links.insert(field.to_string(), Link::unresolved(value.clone()));
            return Ok(());
        }
        if let (Some(target), Some(owner)) = (kind.unwrap_target(field), owner) {
            if let Some(attr) = unwrap(registry, target, owner, field, value)? {
                self.fields.insert(field.to_string(), attr);
            }
            return Ok(());
        }
        let is_key_field = kind.path().is_some_and(|path| path.key_field() == field);
        if kind.declares(field) || is_key_field {
            self.fields.insert(field.to_string(), Attr::Scalar(value.clone()));
        } else {
            self.extra.insert(field, value.clone());
        }
        Ok(())
    }

    pub(crate) fn cache(&mut self, attr: &str, resolved: Resolved) {
        self.links.entry(attr.to_string()).or_default().cache(resolved);
    }
}

fn unwrap(
    registry: &Registry,
    target: crate::registry::KindId,
    owner: &EntityRef,
    field: &str,
    value: &Value,
) -> CoreResult<Option<Attr>> {
    let kind = registry.kind(target)?;
    if !kind.topology().is_array() {
        return match value {
            Value::Map(sub) => {
                let child = Entity::build(registry, target, sub.clone(), Some(owner.clone()))?;
                Ok(Some(Attr::Child(Box::new(child))))
            }
            Value::Null => Ok(None),
            other => {
                warn!(field, found = other.type_name(), "embedded field is not a document");
                Ok(None)
            }
        };
    }

    let Some(items) = value.as_array() else {
        warn!(field, found = value.type_name(), "unwrapped field is not an array");
        return Ok(None);
    };
    let key_field = kind.field_path()?.key_field();
    let mut children = Vec::with_capacity(items.len());
    for item in items {
        let keyed = item
            .as_map()
            .filter(|sub| sub.get(key_field).and_then(Key::from_value).is_some());
        match keyed {
            Some(sub) => children.push(Entity::build(
                registry,
                target,
                sub.clone(),
                Some(owner.clone()),
            )?),
            None => warn!(field, key_field, "skipping array element without a key"),
        }
    }
    Ok(Some(Attr::Children(children)))
}
