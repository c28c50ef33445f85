//! # spnet Testkit
//!
//! Test utilities for spnet.
//!
//! This crate provides:
//! - Platform fixtures over in-memory and temp-dir stores
//! - Stub, failing and JSON external sources
//! - Property-based test generators using proptest
//! - Tracing initialisation for tests
//!
//! ## Usage
//!
//! ```rust
//! use spnet_testkit::prelude::*;
//!
//! with_platform(|platform| {
//!     let stub = StubSource::titled("Y");
//!     let first = platform.paper_by_arxiv("9999", &stub).unwrap();
//!     let second = platform.paper_by_arxiv("9999", &stub).unwrap();
//!     assert_eq!(first, second);
//!     assert_eq!(stub.calls(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod sources;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::sources::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use sources::*;
