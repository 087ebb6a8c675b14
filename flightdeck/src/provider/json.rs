//! Small helpers for picking fields out of loosely-typed provider JSON.

use serde_json::Value;

/// First non-empty string among `keys`, trimmed.
pub(crate) fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(*key).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// First integer among `keys`.
pub(crate) fn first_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_i64))
}

/// Float field, accepting integers too.
pub(crate) fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_str_skips_empty_and_missing() {
        let v = json!({"a": "", "b": null, "c": " hit "});
        assert_eq!(first_str(&v, &["a", "b", "c"]).as_deref(), Some("hit"));
        assert_eq!(first_str(&v, &["a", "b"]), None);
    }

    #[test]
    fn test_numeric_helpers() {
        let v = json!({"delay": 25, "lat": 48.85});
        assert_eq!(first_i64(&v, &["missing", "delay"]), Some(25));
        assert_eq!(get_f64(&v, "lat"), Some(48.85));
        assert_eq!(get_f64(&v, "delay"), Some(25.0));
    }
}
