use serde_json::{Map, Number, Value};

/// Normalise a JSON value so that structurally equal values compare equal.
///
/// Floats with an integral value are turned into integers (`1.0` becomes
/// `1`), and object keys are rebuilt in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Canonical byte encoding: compact JSON with sorted keys at every level.
///
/// Key order is enforced by the writer itself, so the output does not depend
/// on whether `serde_json` was built with `preserve_order`.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&canonicalize(value), &mut out);
    out
}

fn canonical_number(n: &Number) -> Number {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
                return Number::from(f as i64);
            }
        }
    }
    n.clone()
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(b':');
                write_value(val, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    // Scalars have exactly one compact rendering.
    out.extend_from_slice(value.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"b": 1, "a": {"y": true, "x": null}});
        let b = json!({"a": {"x": null, "y": true}, "b": 1});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
        assert_eq!(
            String::from_utf8(canonical_bytes(&a)).unwrap(),
            r#"{"a":{"x":null,"y":true},"b":1}"#
        );
    }

    #[test]
    fn integral_floats_collapse() {
        assert_eq!(canonical_bytes(&json!(1.0)), canonical_bytes(&json!(1)));
        assert_ne!(canonical_bytes(&json!(1.5)), canonical_bytes(&json!(1)));
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(canonical_bytes(&json!([1, 2])), canonical_bytes(&json!([2, 1])));
    }

    #[test]
    fn strings_are_escaped() {
        let bytes = canonical_bytes(&json!({"k": "a\"b"}));
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"k":"a\"b"}"#);
    }
}
