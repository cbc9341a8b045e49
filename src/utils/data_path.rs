use serde_json::Value;

/// Minimal dot-path walker for response extraction: object keys only,
/// optional leading `$.`, no arrays, filters, or wildcards. A missing
/// key yields `Null`; a non-object midway is returned as-is.
pub fn extract_path(value: &Value, path: &str) -> Value {
    let trimmed = path.trim();
    let stripped = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);
    let mut current = value.clone();
    for key in stripped.split('.') {
        if key.is_empty() || current.is_null() {
            continue;
        }
        if let Value::Object(map) = &current {
            current = map.get(key).cloned().unwrap_or(Value::Null);
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_nested_objects() {
        let body = json!({"data": {"temp": 21}});
        assert_eq!(extract_path(&body, "$.data.temp"), json!(21));
        assert_eq!(extract_path(&body, "data.temp"), json!(21));
    }

    #[test]
    fn missing_key_yields_null() {
        let body = json!({"data": {}});
        assert_eq!(extract_path(&body, "$.data.temp"), Value::Null);
        assert_eq!(extract_path(&body, "$.nope.deeper.still"), Value::Null);
    }

    #[test]
    fn scalar_midway_is_returned_as_is() {
        let body = json!({"data": 5});
        assert_eq!(extract_path(&body, "$.data.temp"), json!(5));
    }

    #[test]
    fn empty_path_returns_whole_value() {
        let body = json!({"a": 1});
        assert_eq!(extract_path(&body, "$"), body);
    }
}
