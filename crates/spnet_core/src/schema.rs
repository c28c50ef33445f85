//! Entity kind declarations.

use crate::field_path::FieldPath;
use crate::link::LinkSpec;
use crate::registry::KindId;
use crate::error::{CoreError, CoreResult};
use crate::types::{KeyPolicy, Topology};
use spnet_value::Document;
use std::collections::{BTreeMap, BTreeSet};

/// Declaration of one entity kind, handed to a
/// [`RegistryBuilder`](crate::RegistryBuilder).
///
/// ```rust
/// use spnet_core::{KeyPolicy, KindSpec};
///
/// let topic = KindSpec::top_level("Topic", "topic").key_policy(KeyPolicy::Supplied);
/// let arxiv = KindSpec::embedded("ArxivPaperData", "paper", "arxiv.id")
///     .fields(["title", "authorNames"])
///     .seed("title", "title");
/// # let _ = (topic, arxiv);
/// ```
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub(crate) name: String,
    pub(crate) topology: Topology,
    pub(crate) collection: String,
    pub(crate) path: Option<String>,
    pub(crate) key_policy: KeyPolicy,
    pub(crate) required: Vec<String>,
    pub(crate) fields: Vec<String>,
    pub(crate) parent_seed: Vec<(String, String)>,
}

impl KindSpec {
    fn new(name: &str, topology: Topology, collection: &str, path: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            topology,
            collection: collection.to_string(),
            path: path.map(str::to_string),
            key_policy: KeyPolicy::Generated,
            required: Vec::new(),
            fields: Vec::new(),
            parent_seed: Vec::new(),
        }
    }

    /// A kind stored as one record per entity.
    #[must_use]
    pub fn top_level(name: &str, collection: &str) -> Self {
        Self::new(name, Topology::TopLevel, collection, None)
    }

    /// A kind stored as a sub-document at `path`'s container field.
    #[must_use]
    pub fn embedded(name: &str, collection: &str, path: &str) -> Self {
        Self::new(name, Topology::Embedded, collection, Some(path))
    }

    /// A kind stored as elements of an array, keyed per parent.
    #[must_use]
    pub fn array_element(name: &str, collection: &str, path: &str) -> Self {
        Self::new(name, Topology::ArrayElement, collection, Some(path))
    }

    /// A kind stored as elements of an array, keyed across the collection.
    #[must_use]
    pub fn unique_array_element(name: &str, collection: &str, path: &str) -> Self {
        Self::new(name, Topology::UniqueArrayElement, collection, Some(path))
    }

    /// Sets the primary-key policy (top-level kinds).
    #[must_use]
    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Declares fields every insert must supply.
    #[must_use]
    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            self.fields.push(field.clone());
            self.required.push(field);
        }
        self
    }

    /// Declares scalar fields. Undeclared fields land in the extra bag.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// When an insert has to manufacture the parent record, copy field
    /// `from` of the entity's data into field `to` of the parent.
    #[must_use]
    pub fn seed(mut self, from: &str, to: &str) -> Self {
        self.parent_seed.push((from.to_string(), to.to_string()));
        self
    }
}

/// A registered entity kind.
#[derive(Debug, Clone)]
pub struct Kind {
    pub(crate) id: KindId,
    pub(crate) name: String,
    pub(crate) topology: Topology,
    pub(crate) collection: String,
    pub(crate) path: Option<FieldPath>,
    pub(crate) key_policy: KeyPolicy,
    pub(crate) required: Vec<String>,
    pub(crate) fields: BTreeSet<String>,
    pub(crate) parent: Option<KindId>,
    pub(crate) parent_seed: Vec<(String, String)>,
    pub(crate) links: BTreeMap<String, LinkSpec>,
    pub(crate) unwraps: BTreeMap<String, KindId>,
}

impl Kind {
    /// Registry index.
    #[must_use]
    pub fn id(&self) -> KindId {
        self.id
    }

    /// Kind name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage shape.
    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Physical collection (the parent's, for nested kinds).
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Field path of a nested kind.
    #[must_use]
    pub fn path(&self) -> Option<&FieldPath> {
        self.path.as_ref()
    }

    pub(crate) fn field_path(&self) -> CoreResult<&FieldPath> {
        self.path.as_ref().ok_or_else(|| {
            CoreError::invalid_operation(format!("{} is not a nested kind", self.name))
        })
    }

    /// Primary-key policy.
    #[must_use]
    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    /// Fields every insert must supply.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Whether `field` is a declared scalar.
    #[must_use]
    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// The top-level kind owning records of a nested kind.
    #[must_use]
    pub fn parent(&self) -> Option<KindId> {
        self.parent
    }

    /// The link declared on `attr`.
    #[must_use]
    pub fn link(&self, attr: &str) -> Option<&LinkSpec> {
        self.links.get(attr)
    }

    /// Declared link attribute names.
    pub fn link_names(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(String::as_str)
    }

    /// The nested kind `field` unwraps into.
    #[must_use]
    pub fn unwrap_target(&self, field: &str) -> Option<KindId> {
        self.unwraps.get(field).copied()
    }

    /// The first required field missing (or null) in `data`.
    #[must_use]
    pub fn missing_required(&self, data: &Document) -> Option<&str> {
        self.required
            .iter()
            .find(|field| data.get(field).map_or(true, |v| v.is_null()))
            .map(String::as_str)
    }

    /// Builds the fields of a manufactured parent record from the data of
    /// a nested entity.
    #[must_use]
    pub fn seed_parent(&self, data: &Document) -> Document {
        let mut parent = Document::new();
        for (from, to) in &self.parent_seed {
            if let Some(value) = data.get(from) {
                parent.insert(to.as_str(), value.clone());
            }
        }
        parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use spnet_value::doc;

    #[test]
    fn required_fields_are_declared() {
        let spec = KindSpec::top_level("Paper", "paper").required(["title"]).fields(["year"]);
        assert_eq!(spec.required, vec!["title".to_string()]);
        assert_eq!(spec.fields, vec!["title".to_string(), "year".to_string()]);
    }

    #[test]
    fn seed_parent_copies_mapped_fields() {
        let registry = RegistryBuilder::new()
            .kind(KindSpec::top_level("Person", "person"))
            .kind(
                KindSpec::embedded("GplusPersonData", "person", "gplus.id")
                    .seed("displayName", "name"),
            )
            .build()
            .unwrap();
        let gplus = registry.kind_named("GplusPersonData").unwrap();
        let seeded = gplus.seed_parent(&doc! { "id" => "g1", "displayName" => "Alice" });
        assert_eq!(seeded, doc! { "name" => "Alice" });
    }

    #[test]
    fn missing_required_treats_null_as_missing() {
        let registry = RegistryBuilder::new()
            .kind(KindSpec::top_level("Paper", "paper").required(["title"]))
            .build()
            .unwrap();
        let paper = registry.kind_named("Paper").unwrap();
        assert_eq!(paper.missing_required(&doc! {}), Some("title"));
        assert_eq!(paper.missing_required(&doc! { "title" => () }), Some("title"));
        assert_eq!(paper.missing_required(&doc! { "title" => "X" }), None);
    }
}
