//! # spnet Value
//!
//! Schema-less document values for the spnet document mapper.
//!
//! This crate provides:
//! - [`Value`], the dynamic value stored in document fields
//! - [`Document`], an ordered field map (one stored record or sub-record)
//! - [`ObjectId`], the opaque 128-bit key generated by stores
//! - A JSON bridge for external metadata sources
//! - CBOR helpers used by durable stores
//!
//! ## Usage
//!
//! ```
//! use spnet_value::{doc, Value};
//!
//! let paper = doc! {
//!     "title" => "boring article",
//!     "year" => 2011,
//!     "authors" => vec!["jojo"],
//! };
//!
//! assert_eq!(paper.get("year"), Some(&Value::Integer(2011)));
//! assert_eq!(paper.get_path("authors.0").and_then(Value::as_text), Some("jojo"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod document;
mod error;
mod id;
mod json;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use document::{Document, ID_FIELD};
pub use error::{ValueError, ValueResult};
pub use id::ObjectId;
pub use value::Value;

/// Builds a [`Document`] from `key => value` pairs.
///
/// Values go through `Into<Value>`, so literals, strings, vectors and
/// nested documents can be mixed freely.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut document = $crate::Document::new();
        $(
            document.insert($key, $value);
        )+
        document
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_macro_builds_nested_documents() {
        let d = doc! {
            "title" => "great article",
            "arxiv" => doc! { "id" => "1234.5678" },
            "authors" => vec![Value::from("fred"), Value::from("jojo")],
        };

        assert_eq!(d.len(), 3);
        assert_eq!(
            d.get_path("arxiv.id"),
            Some(&Value::Text("1234.5678".to_string()))
        );
        assert_eq!(d.get_path("authors.1").and_then(Value::as_text), Some("jojo"));
    }

    #[test]
    fn empty_doc_macro() {
        let d = doc! {};
        assert!(d.is_empty());
    }
}
