//! The relation registry: every entity kind, its links and its unwrap
//! rules, built once at start-up.
//!
//! Kinds refer to each other by name while the registry is being built;
//! [`RegistryBuilder::build`] turns names into [`KindId`] indices, so
//! circular relations (Paper → Person → Paper) need no forward
//! declarations.

use crate::error::{CoreError, CoreResult};
use crate::field_path::FieldPath;
use crate::link::{LinkDef, LinkSpec, Strategy, TargetDef};
use crate::schema::{Kind, KindSpec};
use crate::types::Topology;
use std::collections::{BTreeMap, HashMap};

/// Index of a kind in its [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(usize);

impl KindId {
    /// The raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Collects kind, link and unwrap declarations.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    kinds: Vec<KindSpec>,
    links: Vec<(String, String, LinkDef)>,
    unwraps: Vec<(String, String, String)>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a kind.
    #[must_use]
    pub fn kind(mut self, spec: KindSpec) -> Self {
        self.kinds.push(spec);
        self
    }

    /// Declares link `attr` on kind `owner`.
    #[must_use]
    pub fn link(mut self, owner: &str, attr: &str, def: LinkDef) -> Self {
        self.links.push((owner.to_string(), attr.to_string(), def));
        self
    }

    /// Declares that field `field` of top-level kind `owner` holds
    /// entities of nested kind `target`.
    #[must_use]
    pub fn unwrap(mut self, owner: &str, field: &str, target: &str) -> Self {
        self.unwraps
            .push((owner.to_string(), field.to_string(), target.to_string()));
        self
    }

    /// Validates every declaration and builds the registry.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MalformedFieldPath`] for a nested kind's path
    /// - [`CoreError::InvalidOperation`] for duplicate kind names, unknown
    ///   kind names, nested kinds without a top-level kind on their
    ///   collection, and links or unwrap rules that do not fit the
    ///   topologies involved
    pub fn build(self) -> CoreResult<Registry> {
        let mut by_name = HashMap::new();
        for (index, spec) in self.kinds.iter().enumerate() {
            if by_name.insert(spec.name.clone(), KindId(index)).is_some() {
                return Err(CoreError::invalid_operation(format!(
                    "kind {} declared twice",
                    spec.name
                )));
            }
        }
        let id_of = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| CoreError::invalid_operation(format!("unknown kind {name}")))
        };

        let mut owners: HashMap<&str, KindId> = HashMap::new();
        for (index, spec) in self.kinds.iter().enumerate() {
            if spec.topology == Topology::TopLevel
                && owners.insert(spec.collection.as_str(), KindId(index)).is_some()
            {
                return Err(CoreError::invalid_operation(format!(
                    "two top-level kinds share collection {}",
                    spec.collection
                )));
            }
        }

        let mut kinds = Vec::with_capacity(self.kinds.len());
        for (index, spec) in self.kinds.iter().enumerate() {
            let path = spec.path.as_deref().map(FieldPath::parse).transpose()?;
            let parent = if spec.topology.is_nested() {
                Some(owners.get(spec.collection.as_str()).copied().ok_or_else(|| {
                    CoreError::invalid_operation(format!(
                        "{} lives in {} but no top-level kind owns that collection",
                        spec.name, spec.collection
                    ))
                })?)
            } else {
                None
            };
            kinds.push(Kind {
                id: KindId(index),
                name: spec.name.clone(),
                topology: spec.topology,
                collection: spec.collection.clone(),
                path,
                key_policy: spec.key_policy,
                required: spec.required.clone(),
                fields: spec.fields.iter().cloned().collect(),
                parent,
                parent_seed: spec.parent_seed.clone(),
                links: BTreeMap::new(),
                unwraps: BTreeMap::new(),
            });
        }

        for (owner, attr, def) in self.links {
            let owner_id = id_of(&owner)?;
            let strategy = match def.target {
                TargetDef::ByKey(target) => Strategy::ByKey(fetchable(&kinds, id_of(&target)?)?),
                TargetDef::ByKeyList(target) => {
                    Strategy::ByKeyList(fetchable(&kinds, id_of(&target)?)?)
                }
                TargetDef::ByReverseQuery(target, query) => Strategy::ByReverseQuery {
                    target: id_of(&target)?,
                    query,
                },
                TargetDef::ByParentRef => {
                    if !kinds[owner_id.0].topology.is_nested() {
                        return Err(CoreError::invalid_operation(format!(
                            "{owner}.{attr}: only nested kinds have a parent"
                        )));
                    }
                    Strategy::ByParentRef
                }
            };
            let spec = LinkSpec {
                strategy,
                missing: def.missing,
            };
            if kinds[owner_id.0].links.insert(attr.clone(), spec).is_some() {
                return Err(CoreError::invalid_operation(format!(
                    "link {owner}.{attr} declared twice"
                )));
            }
        }

        for (owner, field, target) in self.unwraps {
            let owner_id = id_of(&owner)?;
            let target_id = id_of(&target)?;
            let target_kind = &kinds[target_id.0];
            let fits = target_kind.parent == Some(owner_id)
                && target_kind
                    .path
                    .as_ref()
                    .is_some_and(|path| path.container() == field);
            if !fits {
                return Err(CoreError::invalid_operation(format!(
                    "{owner}.{field} cannot unwrap into {target}"
                )));
            }
            kinds[owner_id.0].unwraps.insert(field, target_id);
        }

        Ok(Registry { kinds, by_name })
    }
}

/// ByKey targets are fetched by their own key alone.
fn fetchable(kinds: &[Kind], id: KindId) -> CoreResult<KindId> {
    if kinds[id.0].topology == Topology::ArrayElement {
        return Err(CoreError::invalid_operation(format!(
            "{} elements cannot be fetched by key alone",
            kinds[id.0].name
        )));
    }
    Ok(id)
}

/// Every registered kind, indexed by [`KindId`].
#[derive(Debug)]
pub struct Registry {
    kinds: Vec<Kind>,
    by_name: HashMap<String, KindId>,
}

impl Registry {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The kind with index `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an id from another registry.
    pub fn kind(&self, id: KindId) -> CoreResult<&Kind> {
        self.kinds
            .get(id.0)
            .ok_or_else(|| CoreError::invalid_operation(format!("no kind with index {}", id.0)))
    }

    /// The id of the kind called `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// The kind called `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an unknown name.
    pub fn kind_named(&self, name: &str) -> CoreResult<&Kind> {
        let id = self
            .lookup(name)
            .ok_or_else(|| CoreError::invalid_operation(format!("unknown kind {name}")))?;
        self.kind(id)
    }

    /// Every kind in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = &Kind> {
        self.kinds.iter()
    }

    /// Number of kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether no kinds are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
