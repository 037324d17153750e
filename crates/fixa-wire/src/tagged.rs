//! Single-key variant containers.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, WireError};

/// Split `{"<variant>": <record>}` into its key and record.
///
/// Zero keys is [`WireError::EmptyContainer`]; anything other than an
/// object with exactly one key is [`WireError::MalformedVariant`]. Whether
/// the key is recognized is up to the caller.
pub(crate) fn split_variant(value: Value) -> Result<(String, Value)> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(WireError::malformed(
                "container",
                format!("expected a single-key object, found {}", json_type(&other)),
            ))
        }
    };

    let count = map.len();
    let mut entries = map.into_iter();
    match (entries.next(), entries.next()) {
        (None, _) => Err(WireError::EmptyContainer),
        (Some(entry), None) => Ok(entry),
        (Some(_), Some(_)) => Err(WireError::malformed(
            "container",
            format!("expected exactly one variant key, found {count}"),
        )),
    }
}

/// Deserialize the record of `variant`, reporting any mismatch as malformed.
pub(crate) fn record<T: DeserializeOwned>(variant: &str, record: Value) -> Result<T> {
    serde_json::from_value(record).map_err(|err| WireError::malformed(variant, err))
}

pub(crate) fn finite(value: f32, variant: &str, field: &str) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(WireError::malformed(variant, format!("{field} is out of f32 range")))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn splits_single_key() {
        let (key, record) = split_variant(json!({"bool": {"value": true}})).unwrap();
        assert_eq!(key, "bool");
        assert_eq!(record, json!({"value": true}));
    }

    #[test]
    fn empty_object_is_empty_container() {
        assert!(matches!(split_variant(json!({})), Err(WireError::EmptyContainer)));
    }

    #[test]
    fn non_objects_and_multi_key_are_malformed() {
        for input in [
            json!(null),
            json!([{"bool": {}}]),
            json!("bool"),
            json!({"bool": {}, "float": {}}),
        ] {
            assert!(
                matches!(split_variant(input.clone()), Err(WireError::MalformedVariant { .. })),
                "{input}"
            );
        }
    }
}
