use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Recursively sort JSON object keys and produce a canonical string.
///
/// - Object keys are sorted lexicographically (BTreeMap guarantees this).
/// - Arrays preserve element order.
/// - All insignificant whitespace is removed.
pub fn canonicalize_schema(schema: &Value) -> String {
    let sorted = sort_keys_recursive(schema);
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// SHA-256 hash of a canonical string, returned as raw bytes.
pub fn hash_canonical(canonical: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().to_vec()
}

/// Canonicalize a schema and return its SHA-256 hash.
pub fn canonicalize_and_hash(schema: &Value) -> Vec<u8> {
    let canonical = canonicalize_schema(schema);
    hash_canonical(&canonical)
}

/// Recursively sort all object keys, producing a new Value.
fn sort_keys_recursive(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys_recursive(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys_recursive).collect()),
        other => other.clone(),
    }
}
