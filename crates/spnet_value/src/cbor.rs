//! CBOR encoding for values and anything else that is `serde`-serializable.

use crate::error::{ValueError, ValueResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`ValueError::Encoding`] if serialization fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> ValueResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| ValueError::encoding(e.to_string()))?;
    Ok(buffer)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`ValueError::Decoding`] if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> ValueResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ValueError::decoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, Document, ObjectId, Value};

    #[test]
    fn nested_document_survives_encoding() {
        let d = doc! {
            "_id" => ObjectId::new(),
            "title" => "great article",
            "recommendations" => vec![Value::from(doc! { "author" => "fred", "sigs" => vec!["t1"] })],
            "raw" => Value::Bytes(vec![0, 1, 2]),
        };
        let bytes = to_cbor(&d).unwrap();
        let decoded: Document = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = to_cbor(&doc! { "title" => "X" }).unwrap();
        let err = from_cbor::<Document>(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, ValueError::Decoding { .. }));
    }
}
