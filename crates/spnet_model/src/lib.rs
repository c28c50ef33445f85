//! # spnet Model
//!
//! The entity kinds of the spnet paper-discussion platform wired onto
//! [`spnet_core`]:
//!
//! - [`kinds`]: every kind, link and unwrap rule, and the [`Kinds`] ids
//! - [`Platform`]: a mapper over those kinds with the ingestion helpers
//!   (papers by bibliographic id, people by profile, posts,
//!   recommendations, replies, interests, subscriptions, merging
//!   duplicate papers)
//! - [`views`]: typed read-only accessors over entities
//!
//! ## Usage
//!
//! ```rust
//! use spnet_core::{FnSource, Key};
//! use spnet_model::{views::PaperView, Platform};
//! use spnet_value::doc;
//!
//! let platform = Platform::open_in_memory().unwrap();
//! let arxiv = FnSource::new("arxiv", |_: &Key| Ok(doc! { "title" => "Dark energy" }));
//!
//! let paper = platform.paper_by_arxiv("1302.1234", &arxiv).unwrap();
//! assert_eq!(PaperView::new(&paper).title(), Some("Dark energy"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod kinds;
mod platform;
pub mod views;

pub use kinds::Kinds;
pub use platform::{IncomingPost, MergeReport, Platform};
