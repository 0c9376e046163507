//! [`Meta`]: the `meta` half of a [`crate::Record`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// `meta` is a mapping from string keys to arbitrary values. Two keys are
/// recognized by the substrate (`timestamp`, `pipeline`); everything else
/// passes through untouched in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    /// Milliseconds since epoch. `None` when absent or non-numeric on input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Ordered provenance trail of module tags. Always a sequence; omitted
    /// from the wire form when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<String>,
    /// Every other `meta` key, passed through untouched.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Meta {
    /// Stamp the current wall-clock time and, if `tagging_enabled`,
    /// initialize `pipeline = [tag]`.
    pub fn created(tag: &str, now_ms: i64, tagging_enabled: bool) -> Self {
        let mut meta = Meta {
            timestamp: Some(now_ms),
            pipeline: Vec::new(),
            extra: IndexMap::new(),
        };
        if tagging_enabled {
            meta.pipeline.push(tag.to_string());
        }
        meta
    }

    /// Append `tag` to `pipeline` in place. No-op when tagging is disabled.
    pub fn append_tag(&mut self, tag: &str, tagging_enabled: bool) {
        if tagging_enabled {
            self.pipeline.push(tag.to_string());
        }
    }

    /// `now_ms - timestamp`, if timestamp is present. Used for gate
    /// `max_age_ms` checks and transport delay metrics.
    pub fn age_ms(&self, now_ms: i64) -> Option<i64> {
        self.timestamp.map(|ts| now_ms - ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_tag_is_noop_when_tagging_disabled() {
        let mut m = Meta::created("gat", 1000, false);
        assert!(m.pipeline.is_empty());
        m.append_tag("min", false);
        assert!(m.pipeline.is_empty());
    }

    #[test]
    fn created_and_append_accumulate_in_order() {
        let mut m = Meta::created("gat", 1000, true);
        m.append_tag("min", true);
        assert_eq!(m.pipeline, vec!["gat".to_string(), "min".to_string()]);
    }
}
