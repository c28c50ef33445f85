//! # spnet Store
//!
//! The backing-store contract for the spnet document mapper, and two
//! implementations of it.
//!
//! Stores are **schema-less document collections**. They know nothing of
//! entity kinds, links or field paths; they only evaluate filters, apply
//! single-record updates atomically and enforce unique indexes.
//!
//! ## Design Principles
//!
//! - One call is one atomic write to one record
//! - Absent records are `None`, never an error
//! - Unique-index violations are a distinct error ([`StoreError::DuplicateKey`])
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral deployments
//! - [`FileStore`] - Durable store replaying an append-only operation log
//!
//! ## Example
//!
//! ```rust
//! use spnet_store::{DocumentStore, Filter, InMemoryStore, Update};
//! use spnet_value::{doc, Value};
//!
//! let store = InMemoryStore::new();
//! let id = store.insert("paper", doc! { "title" => "X" }).unwrap();
//!
//! store
//!     .update_one("paper", &Filter::by_id(id.clone()), &Update::push("sigs", "topic1"))
//!     .unwrap();
//!
//! let paper = store.find_one("paper", &Filter::by_id(id), None).unwrap().unwrap();
//! assert_eq!(paper.get_path("sigs.0"), Some(&Value::from("topic1")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod file;
mod filter;
mod memory;
mod options;
mod stats;
mod update;

pub use backend::DocumentStore;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use filter::{Condition, Filter};
pub use memory::InMemoryStore;
pub use options::{FindOptions, IndexSpec, Projection, SortOrder, UpdateResult};
pub use stats::{StatsSnapshot, StoreStats};
pub use update::{PullMatch, Update};
