//! [`Record`]: the canonical `{meta, data}` pair and its normalization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::meta::Meta;
use crate::value::Value;

/// The canonical record shape flowing between modules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Record metadata; always a mapping.
    pub meta: Meta,
    /// Record payload; always a mapping, duck-typed by key.
    pub data: IndexMap<String, Value>,
}

impl Record {
    /// Build a record with a single `data` key, as produced when a
    /// non-mapping JSON value is normalized.
    pub fn scalar(value: Value) -> Self {
        let mut data = IndexMap::new();
        data.insert("value".to_string(), value);
        Record {
            meta: Meta::default(),
            data,
        }
    }
}

/// Normalize an arbitrary JSON value into a canonical [`Record`].
///
/// This function is total and idempotent:
/// - A JSON object carrying `meta` and/or `data` keys is unwrapped into
///   those fields directly (each coerced to a mapping if present but not
///   itself an object).
/// - A JSON object carrying *neither* key is treated as a bare `data`
///   payload with empty `meta` — the common shape for a first producer
///   in a pipeline that hasn't yet been wrapped by any module.
/// - Any other JSON value (scalar, array) is wrapped as
///   `{meta: {}, data: {value: <value>}}`.
pub fn normalize(value: serde_json::Value) -> Record {
    let serde_json::Value::Object(mut obj) = value else {
        return Record::scalar(Value::from(value));
    };

    let has_meta = obj.contains_key("meta");
    let has_data = obj.contains_key("data");

    if !has_meta && !has_data {
        let data = obj
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();
        return Record {
            meta: Meta::default(),
            data,
        };
    }

    let meta_value = obj.remove("meta").unwrap_or(serde_json::Value::Null);
    let data_value = obj.remove("data").unwrap_or(serde_json::Value::Null);

    let meta = match meta_value {
        serde_json::Value::Object(_) => {
            serde_json::from_value(meta_value).unwrap_or_default()
        }
        _ => Meta::default(),
    };

    let data = match data_value {
        serde_json::Value::Object(o) => o.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        serde_json::Value::Null => IndexMap::new(),
        other => {
            let mut m = IndexMap::new();
            m.insert("value".to_string(), Value::from(other));
            m
        }
    };

    Record { meta, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_input_wraps_as_value() {
        let rec = normalize(serde_json::json!(5));
        assert_eq!(rec.data.get("value"), Some(&Value::I64(5)));
        assert!(rec.meta.pipeline.is_empty());
    }

    #[test]
    fn bare_object_without_envelope_becomes_data() {
        let rec = normalize(serde_json::json!({"x": 1, "y": 2}));
        assert_eq!(rec.data.get("x"), Some(&Value::I64(1)));
        assert_eq!(rec.data.len(), 2);
    }

    #[test]
    fn envelope_shape_round_trips() {
        let rec = normalize(serde_json::json!({
            "meta": {"timestamp": 1000, "pipeline": ["gat"]},
            "data": {"x": 1}
        }));
        assert_eq!(rec.meta.timestamp, Some(1000));
        assert_eq!(rec.meta.pipeline, vec!["gat".to_string()]);
        let as_json = serde_json::to_value(&rec).unwrap();
        let round_tripped = normalize(as_json);
        assert_eq!(rec, round_tripped);
    }

    #[test]
    fn missing_meta_and_data_keys_default_to_empty() {
        let rec = normalize(serde_json::json!({"meta": {}, "data": {}}));
        assert!(rec.meta.pipeline.is_empty());
        assert!(rec.meta.timestamp.is_none());
        assert!(rec.data.is_empty());
    }

    #[test]
    fn normalize_is_idempotent() {
        let rec = normalize(serde_json::json!({"data": {"a": 1}}));
        let again = normalize(serde_json::to_value(&rec).unwrap());
        assert_eq!(rec, again);
    }
}
