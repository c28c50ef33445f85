//! Property-based test generators using proptest.

use proptest::prelude::*;
use spnet_core::Key;
use spnet_value::{Document, ObjectId, Value};

/// Strategy for generating object ids.
pub fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    prop::array::uniform16(any::<u8>()).prop_map(ObjectId::from)
}

/// Strategy for generating field names that are not reserved and hold
/// no path separator.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,11}")
        .expect("Invalid regex")
        .prop_filter("Field name must not be a platform field", |s| {
            !matches!(
                s.as_str(),
                "title" | "authors" | "references" | "arxiv" | "pubmed" | "doi"
                    | "recommendations" | "posts" | "issues" | "replies" | "interests"
            )
        })
}

/// Strategy for generating natural keys (bibliographic ids, topic names).
pub fn natural_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9./:-]{0,23}").expect("Invalid regex")
}

/// Strategy for generating keys of either form.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        object_id_strategy().prop_map(Key::Id),
        natural_key_strategy().prop_map(Key::Text),
    ]
}

/// Strategy for generating scalar values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[ -~]{0,24}".prop_map(Value::Text),
        object_id_strategy().prop_map(Value::Id),
    ]
}

/// Strategy for generating values nested up to three levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(|map| Value::Map(Document::from(map))),
        ]
    })
}

/// Strategy for generating paper records: a title plus arbitrary extra
/// fields, without an `_id`.
pub fn paper_data_strategy() -> impl Strategy<Value = Document> {
    (
        "[A-Za-z ]{1,40}",
        prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..5),
    )
        .prop_map(|(title, extra)| {
            let mut data = Document::from(extra);
            data.insert("title", title);
            data
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn natural_keys_are_never_empty(key in natural_key_strategy()) {
            prop_assert!(!key.is_empty());
        }

        #[test]
        fn paper_data_has_a_title(data in paper_data_strategy()) {
            prop_assert!(data.get("title").and_then(Value::as_text).is_some());
            prop_assert!(data.get("_id").is_none());
        }

        #[test]
        fn keys_survive_storage(key in key_strategy()) {
            prop_assert_eq!(Key::from_value(&key.to_value()), Some(key));
        }
    }
}
