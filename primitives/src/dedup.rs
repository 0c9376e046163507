//! The deduplication primitive (spec 4.6): forwards only records whose
//! `data` shows a meaningful change versus the last emitted record. `meta`
//! never participates in the comparison.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tmcp_record::Value;

/// Dedup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DedupConfig {
    /// Keys excluded from the comparison
    pub ignore_fields: Vec<String>,
    /// When present, restricts comparison to exactly this key set
    pub check_fields: Option<Vec<String>>,
    /// `|a - b| <= tolerance` counts as equal for numeric values
    pub numeric_tolerance: f64,
    /// Log every dropped (duplicate) record
    pub debug: bool,
}

/// Dedup runtime state: the last forwarded `data` map.
pub struct Dedup {
    config: DedupConfig,
    last: Option<IndexMap<String, Value>>,
}

impl Dedup {
    /// Build a dedup filter from its configuration.
    pub fn new(config: DedupConfig) -> Self {
        Dedup { config, last: None }
    }

    /// Decide whether `data` differs meaningfully from the last forwarded
    /// record, updating the remembered state as a side effect when it does
    /// (or on the first call, which always forwards).
    pub fn should_forward(&mut self, data: &IndexMap<String, Value>) -> bool {
        let Some(last) = &self.last else {
            self.last = Some(data.clone());
            return true;
        };

        let keys = self.comparison_keys(data);
        let changed = keys.iter().any(|k| {
            let current = data.get(k);
            let previous = last.get(k);
            match (current, previous) {
                (Some(c), Some(p)) => !values_equal(c, p, self.config.numeric_tolerance),
                (Some(_), None) => true,
                (None, Some(_)) => true,
                (None, None) => false,
            }
        });

        if changed {
            self.last = Some(data.clone());
            true
        } else {
            false
        }
    }

    fn comparison_keys(&self, data: &IndexMap<String, Value>) -> Vec<String> {
        let base: Vec<String> = match &self.config.check_fields {
            Some(fields) => fields.clone(),
            None => data.keys().cloned().collect(),
        };
        base.into_iter()
            .filter(|k| !self.config.ignore_fields.contains(k))
            .collect()
    }
}

fn values_equal(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (a, b) {
        (Value::Map(ma), Value::Map(mb)) => {
            if ma.len() != mb.len() {
                return false;
            }
            ma.iter().all(|(k, v)| mb.get(k).is_some_and(|other| v.approx_eq(other, tolerance)))
        }
        _ => a.approx_eq(b, tolerance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(v: serde_json::Value) -> IndexMap<String, Value> {
        match tmcp_record::Value::from(v) {
            Value::Map(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn first_record_always_forwards() {
        let mut d = Dedup::new(DedupConfig::default());
        assert!(d.should_forward(&data(serde_json::json!({"a": 1}))));
    }

    #[test]
    fn ignored_field_does_not_count_as_change() {
        let mut d = Dedup::new(DedupConfig {
            ignore_fields: vec!["t".into()],
            ..Default::default()
        });
        assert!(d.should_forward(&data(serde_json::json!({"t": 1, "a": 1}))));
        assert!(!d.should_forward(&data(serde_json::json!({"t": 2, "a": 1}))));
        assert!(d.should_forward(&data(serde_json::json!({"t": 3, "a": 2}))));
    }

    #[test]
    fn numeric_tolerance_absorbs_small_drift() {
        let mut d = Dedup::new(DedupConfig {
            numeric_tolerance: 0.01,
            ..Default::default()
        });
        assert!(d.should_forward(&data(serde_json::json!({"x": 1.0}))));
        assert!(!d.should_forward(&data(serde_json::json!({"x": 1.005}))));
        assert!(d.should_forward(&data(serde_json::json!({"x": 1.5}))));
    }

    #[test]
    fn check_fields_restricts_comparison() {
        let mut d = Dedup::new(DedupConfig {
            check_fields: Some(vec!["a".into()]),
            ..Default::default()
        });
        assert!(d.should_forward(&data(serde_json::json!({"a": 1, "noise": 1}))));
        assert!(!d.should_forward(&data(serde_json::json!({"a": 1, "noise": 2}))));
    }

    #[test]
    fn nested_map_compares_one_level_shallow() {
        let mut d = Dedup::new(DedupConfig::default());
        assert!(d.should_forward(&data(serde_json::json!({"m": {"x": 1}}))));
        assert!(!d.should_forward(&data(serde_json::json!({"m": {"x": 1}}))));
        assert!(d.should_forward(&data(serde_json::json!({"m": {"x": 2}}))));
    }
}
