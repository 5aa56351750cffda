//! Canonical JSON serialization.
//!
//! Protocol message signatures cover a deterministic byte representation of
//! the message. Canonical form: object keys sorted lexicographically, no
//! whitespace, null-valued fields omitted. Both signer and verifier must
//! produce identical bytes for identical message content, regardless of the
//! field order their serializer happens to emit.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalJsonError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CanonicalJsonError>;

/// Serialize a value to its canonical JSON string.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value)?;
    let canonical = canonicalize_value(json_value);
    Ok(serde_json::to_string(&canonical)?)
}

/// Blake3 hash of the canonical JSON representation.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<[u8; 32]> {
    let canonical_json = to_canonical_json(value)?;
    Ok(*blake3::hash(canonical_json.as_bytes()).as_bytes())
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: BTreeMap<String, Value> = BTreeMap::new();
            for (k, v) in map {
                if !v.is_null() {
                    sorted.insert(k, canonicalize_value(v));
                }
            }
            let mut canonical_map = Map::new();
            for (k, v) in sorted {
                canonical_map.insert(k, v);
            }
            Value::Object(canonical_map)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(canonicalize_value).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        zulu: u64,
        alpha: String,
        skipped: Option<u32>,
    }

    #[test]
    fn test_keys_sorted_and_nulls_omitted() {
        let sample = Sample {
            zulu: 42,
            alpha: "a".to_string(),
            skipped: None,
        };
        let json = to_canonical_json(&sample).unwrap();
        assert_eq!(json, r#"{"alpha":"a","zulu":42}"#);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = Sample {
            zulu: 1,
            alpha: "x".to_string(),
            skipped: Some(3),
        };
        let b = Sample {
            zulu: 1,
            alpha: "x".to_string(),
            skipped: Some(3),
        };
        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn test_nested_objects_are_canonicalized() {
        let value = serde_json::json!({
            "outer": { "b": 2, "a": 1 },
            "list": [ { "z": 0, "y": null } ],
        });
        let json = to_canonical_json(&value).unwrap();
        assert_eq!(json, r#"{"list":[{"z":0}],"outer":{"a":1,"b":2}}"#);
    }
}
