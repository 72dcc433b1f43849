//! Content hashing
//!
//! SHA-256 over the canonical JSON form (object keys sorted recursively),
//! so equal content hashes equally regardless of key insertion order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of the canonical form of `value`
pub fn content_hash(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonicalize(&map[key])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a = json!({ "b": 1, "a": { "y": [1, 2], "x": "z" } });
        let b = json!({ "a": { "x": "z", "y": [1, 2] }, "b": 1 });
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(content_hash(&json!([1, 2])), content_hash(&json!([2, 1])));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash(&json!({}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
