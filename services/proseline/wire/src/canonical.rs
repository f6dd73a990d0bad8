//! Canonical JSON encoding used for signatures and content hashes.
//!
//! Two peers must produce byte-identical output for logically equal values,
//! otherwise signatures never verify across implementations. Rules:
//! - object keys sorted by UTF-8 byte order, recursively
//! - no insignificant whitespace
//! - array order preserved
//! - numbers keep the text they arrived with (`arbitrary_precision`), so
//!   integers beyond 64 bits are not rewritten in exponent form

use crate::WireError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a value to canonical JSON bytes
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WireError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&canon_value(value))?)
}

fn canon_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canon_value(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canon_value).collect()),
        other => other,
    }
}
