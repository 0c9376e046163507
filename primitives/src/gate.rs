//! The gate primitive (spec 4.4): latches open the first time every
//! configured block is simultaneously satisfied, then passes everything.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tmcp_record::Record;

/// One block of the gate's activation condition. All fields within a block
/// are ANDed; a record opens the gate the first time some prior state plus
/// this record satisfies every configured block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateBlock {
    /// Keys that must be present and non-null
    pub must_have: Vec<String>,
    /// Numeric lower bounds, inclusive
    pub min_values: IndexMap<String, f64>,
    /// Required boolean values; `true` requires presence, `false` only forbids `true`
    pub bool_equal: IndexMap<String, bool>,
    /// Required exact string values
    pub str_equal: IndexMap<String, String>,
    /// Maximum age of `meta.timestamp` relative to `now`, in ms
    pub max_age_ms: Option<i64>,
    /// Diagnostic-only: age past which a one-shot warning is logged
    pub timeout_ms: Option<i64>,
}

/// Outcome of one [`Gate::evaluate`] call.
pub struct GateOutcome {
    /// Whether the record should be forwarded
    pub open: bool,
    /// `true` exactly once, the first evaluation past every block's `timeoutMs`
    /// while the gate is still closed
    pub timeout_warning: bool,
}

/// Latching activation gate. Never buffers; every record is either dropped
/// (gate still closed) or forwarded (gate open, forever after).
pub struct Gate {
    blocks: Vec<GateBlock>,
    opened: bool,
    warned: bool,
    start_ms: Option<i64>,
}

impl Gate {
    /// Build a gate from its configured blocks. An empty list opens on the
    /// first record.
    pub fn new(blocks: Vec<GateBlock>) -> Self {
        Gate {
            blocks,
            opened: false,
            warned: false,
            start_ms: None,
        }
    }

    /// Evaluate one record against the gate's current state.
    pub fn evaluate(&mut self, record: &Record, now_ms: i64) -> GateOutcome {
        if self.opened {
            return GateOutcome {
                open: true,
                timeout_warning: false,
            };
        }

        let start = *self.start_ms.get_or_insert(now_ms);

        if self.blocks.iter().all(|b| block_satisfied(b, record, now_ms)) {
            self.opened = true;
            return GateOutcome {
                open: true,
                timeout_warning: false,
            };
        }

        let max_timeout = self.blocks.iter().filter_map(|b| b.timeout_ms).max();
        let mut timeout_warning = false;
        if !self.warned {
            if let Some(timeout) = max_timeout {
                if now_ms - start >= timeout {
                    self.warned = true;
                    timeout_warning = true;
                }
            }
        }

        GateOutcome {
            open: false,
            timeout_warning,
        }
    }
}

fn block_satisfied(block: &GateBlock, record: &Record, now_ms: i64) -> bool {
    let data = &record.data;

    for key in &block.must_have {
        match data.get(key) {
            Some(v) if !v.is_null() => {}
            _ => return false,
        }
    }

    for (key, min) in &block.min_values {
        match data.get(key).and_then(|v| v.as_f64()) {
            Some(v) if v >= *min => {}
            _ => return false,
        }
    }

    for (key, want) in &block.bool_equal {
        let have = data.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        if *want {
            if !have {
                return false;
            }
        } else if have {
            return false;
        }
    }

    for (key, want) in &block.str_equal {
        if data.get(key).and_then(|v| v.as_str()) != Some(want.as_str()) {
            return false;
        }
    }

    if let Some(max_age) = block.max_age_ms {
        match record.meta.timestamp {
            Some(ts) => {
                if now_ms - ts > max_age {
                    return false;
                }
            }
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(data: serde_json::Value) -> Record {
        tmcp_record::normalize(serde_json::json!({"data": data}))
    }

    #[test]
    fn empty_config_opens_on_first_record() {
        let mut gate = Gate::new(vec![]);
        let outcome = gate.evaluate(&rec(serde_json::json!({})), 0);
        assert!(outcome.open);
    }

    #[test]
    fn latches_open_forever() {
        let block = GateBlock {
            must_have: vec!["ready".into()],
            bool_equal: IndexMap::from([("ready".to_string(), true)]),
            ..Default::default()
        };
        let mut gate = Gate::new(vec![block]);

        assert!(!gate.evaluate(&rec(serde_json::json!({})), 0).open);
        assert!(!gate.evaluate(&rec(serde_json::json!({"ready": false})), 1).open);
        assert!(gate.evaluate(&rec(serde_json::json!({"ready": true, "x": 9})), 2).open);
        // Once open, even a record that would fail every block still passes.
        assert!(gate.evaluate(&rec(serde_json::json!({"y": 1})), 3).open);
    }

    #[test]
    fn max_age_with_absent_timestamp_never_passes() {
        let block = GateBlock {
            max_age_ms: Some(1000),
            ..Default::default()
        };
        let mut gate = Gate::new(vec![block]);
        let outcome = gate.evaluate(&rec(serde_json::json!({})), 5000);
        assert!(!outcome.open);
    }

    #[test]
    fn timeout_warning_fires_once() {
        let block = GateBlock {
            must_have: vec!["ready".into()],
            timeout_ms: Some(100),
            ..Default::default()
        };
        let mut gate = Gate::new(vec![block]);
        assert!(!gate.evaluate(&rec(serde_json::json!({})), 0).timeout_warning);
        assert!(gate.evaluate(&rec(serde_json::json!({})), 150).timeout_warning);
        assert!(!gate.evaluate(&rec(serde_json::json!({})), 200).timeout_warning);
    }
}
