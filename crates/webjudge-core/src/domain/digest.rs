//! Payload digests for correlating log lines with an inbound request.

use sha2::{Digest, Sha256};

/// Recursively sort object keys so the digest ignores the key order a
/// payload was received in.
fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// SHA256 hex digest of the key-sorted compact JSON form of `value`.
pub fn payload_digest(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sort_keys(value).to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_stable_across_key_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"task_prompt": "x", "action_budget": 3}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"action_budget": 3, "task_prompt": "x"}"#).unwrap();
        assert_eq!(payload_digest(&a), payload_digest(&b));
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let digest = payload_digest(&json!({"task_prompt": "x"}));
        assert_eq!(digest.len(), 64);
        assert_ne!(digest, payload_digest(&json!({"task_prompt": "y"})));
    }
}
