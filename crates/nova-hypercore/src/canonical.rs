//! Deterministic canonical byte encoding for opaque log payloads.
//!
//! `serde_json::Value` does not guarantee stable field order across
//! independently-constructed maps (unless the `preserve_order` feature is
//! enabled, which we do not rely on), so two logically-identical payloads
//! could serialize to different bytes and therefore hash differently. This
//! module walks the value tree and sorts object keys explicitly, producing a
//! byte string that depends only on the logical value, not on insertion
//! order.

use serde_json::Value;

/// Encode `value` into a deterministic byte string.
///
/// Tag bytes distinguish JSON types so that e.g. the string `"1"` and the
/// number `1` never collide.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(b'n'),
        Value::Bool(false) => out.push(b'f'),
        Value::Bool(true) => out.push(b't'),
        Value::Number(n) => {
            out.push(b'i');
            write_len_prefixed(n.to_string().as_bytes(), out);
        }
        Value::String(s) => {
            out.push(b's');
            write_len_prefixed(s.as_bytes(), out);
        }
        Value::Array(items) => {
            out.push(b'a');
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                write_value(item, out);
            }
        }
        Value::Object(map) => {
            out.push(b'o');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.extend_from_slice(&(keys.len() as u32).to_be_bytes());
            for key in keys {
                write_len_prefixed(key.as_bytes(), out);
                write_value(&map[key], out);
            }
        }
    }
}

fn write_len_prefixed(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_output() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn distinct_values_produce_distinct_bytes() {
        let a = json!({"v": "1"});
        let b = json!({"v": 1});
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn nested_structures_are_deterministic() {
        let a = json!({"x": [1, 2, {"z": "q", "y": 1}]});
        let b = json!({"x": [1, 2, {"y": 1, "z": "q"}]});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn repeated_encoding_is_stable() {
        let v = json!({"nested": {"c": 3, "a": 1, "b": 2}, "arr": [3, 1, 2]});
        assert_eq!(canonical_bytes(&v), canonical_bytes(&v));
    }
}
