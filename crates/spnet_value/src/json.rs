//! Bridge between [`Value`] and `serde_json`.
//!
//! External metadata sources usually speak JSON. Numbers that do not fit
//! an `i64` (fractions, huge unsigned values) are kept as their decimal
//! text, since documents carry no floats.

use crate::document::Document;
use crate::error::{ValueError, ValueResult};
use crate::value::Value;
use serde_json::Value as Json;

impl Value {
    /// Converts a JSON value into a document value.
    #[must_use]
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Text(n.to_string()),
            },
            Json::String(s) => Value::Text(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into JSON.
    ///
    /// Object ids become their hex string, byte strings become arrays of
    /// numbers.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(n) => Json::from(*n),
            Value::Text(s) => Json::String(s.clone()),
            Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Value::Id(id) => Json::String(id.to_hex()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(doc) => doc.to_json(),
        }
    }
}

impl Document {
    /// Converts a JSON object into a document.
    pub fn from_json(json: Json) -> ValueResult<Self> {
        match Value::from_json(json) {
            Value::Map(doc) => Ok(doc),
            other => Err(ValueError::NotADocument {
                found: other.type_name(),
            }),
        }
    }

    /// Converts this document into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, ObjectId};
    use serde_json::json;

    #[test]
    fn arxiv_entry_from_json() {
        let entry = json!({
            "id": "1302.1234",
            "title": "On things",
            "authors": ["A. Person", "B. Person"],
            "score": 1.5,
            "published": null,
        });
        let d = Document::from_json(entry).unwrap();
        assert_eq!(d.get("id").and_then(Value::as_text), Some("1302.1234"));
        assert_eq!(d.get_path("authors.1").and_then(Value::as_text), Some("B. Person"));
        assert_eq!(d.get("score").and_then(Value::as_text), Some("1.5"));
        assert!(d.get("published").unwrap().is_null());
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = Document::from_json(json!([1, 2])).unwrap_err();
        assert_eq!(err, ValueError::NotADocument { found: "array" });
    }

    #[test]
    fn ids_render_as_hex() {
        let id = ObjectId::from_bytes([0xab; 16]);
        let d = doc! { "_id" => id, "n" => 3 };
        assert_eq!(
            d.to_json(),
            json!({ "_id": "abababababababababababababababab", "n": 3 })
        );
    }
}
