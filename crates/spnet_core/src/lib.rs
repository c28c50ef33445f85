//! # spnet Core
//!
//! Document-object mapping layer for spnet.
//!
//! This crate provides:
//! - [`Registry`] of entity kinds, their links and unwrap rules
//! - [`Entity`], a typed view of a record in one of four storage shapes
//!   (top-level record, embedded sub-document, array element, globally
//!   unique array element)
//! - Lazy links resolved on demand and cached per instance
//! - Get-or-create against [`ExternalSource`]s
//! - The [`Mapper`] facade tying them to a [`DocumentStore`](spnet_store::DocumentStore)
//!
//! ## Usage
//!
//! ```rust
//! use spnet_core::{KindSpec, LinkDef, Mapper, NewEntity, Registry};
//! use spnet_store::InMemoryStore;
//! use spnet_value::doc;
//! use std::sync::Arc;
//!
//! let registry = Registry::builder()
//!     .kind(KindSpec::top_level("Paper", "paper").required(["title"]))
//!     .kind(KindSpec::top_level("Person", "person"))
//!     .link("Paper", "authors", LinkDef::by_key_list("Person"))
//!     .build()
//!     .unwrap();
//! let mapper = Mapper::open(Arc::new(InMemoryStore::new()), registry).unwrap();
//!
//! let person = mapper.kind_id("Person").unwrap();
//! let paper = mapper.kind_id("Paper").unwrap();
//! let fred = mapper.insert(person, NewEntity::new(doc! { "name" => "fred" })).unwrap();
//! let mut article = mapper
//!     .insert(
//!         paper,
//!         NewEntity::new(doc! { "title" => "boring article" }).link("authors", vec![fred.clone()]),
//!     )
//!     .unwrap();
//!
//! let authors = mapper.resolve(&mut article, "authors").unwrap();
//! assert_eq!(authors.entities().next(), Some(&fred));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod error;
mod field_path;
mod get_or_create;
mod handle;
mod link;
mod mapper;
mod registry;
mod schema;
mod types;

pub use config::MapperConfig;
pub use entity::{Attr, ElementDoc, EmbeddedDoc, Entity, Identity, TopLevelDoc};
pub use error::{CoreError, CoreResult, ExternalError, ExternalErrorKind};
pub use field_path::FieldPath;
pub use get_or_create::{ExternalSource, FnSource};
pub use handle::StoreHandle;
pub use link::{Link, LinkDef, LinkSpec, LinkValue, Resolved, ReverseQuery, Strategy};
pub use mapper::{Mapper, NewEntity};
pub use registry::{KindId, Registry, RegistryBuilder};
pub use schema::{Kind, KindSpec};
pub use types::{EntityRef, InsertPolicy, Key, KeyPolicy, Lookup, Topology};
