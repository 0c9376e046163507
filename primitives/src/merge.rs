//! The merge primitive (spec 4.8): a time-aligned join of a primary stream
//! against N side streams, each independently bounded-interpolated or
//! unbounded-hold-last.

use std::collections::VecDeque;

use indexmap::IndexMap;

use tmcp_record::{Record, Value};

/// Per-side interpolation discipline, selected by `allowUnboundedDelay[i]`.
#[derive(Debug, Clone, Copy)]
pub enum SideMode {
    /// Maintain a `[now - maxBufferMs, now]` window and interpolate between
    /// the bracketing records.
    Bounded {
        /// How long a side record stays eligible for interpolation
        max_buffer_ms: i64,
    },
    /// Retain only the latest record with a valid numeric timestamp; never
    /// interpolate, never consult a window.
    Unbounded,
}

#[derive(Debug, Clone)]
struct SideRecord {
    ts: i64,
    data: IndexMap<String, Value>,
}

/// One side stream's buffer and selection logic.
pub struct MergeSide {
    mode: SideMode,
    postfix: String,
    window: VecDeque<SideRecord>,
    latest_unbounded: Option<SideRecord>,
}

impl MergeSide {
    /// Build a side stream with the given mode and output-key postfix
    /// (e.g. `"_1"`).
    pub fn new(mode: SideMode, postfix: impl Into<String>) -> Self {
        MergeSide {
            mode,
            postfix: postfix.into(),
            window: VecDeque::new(),
            latest_unbounded: None,
        }
    }

    /// Ingest one side record. Records without a numeric timestamp are
    /// dropped; they cannot participate in time alignment.
    pub fn ingest(&mut self, record: &Record, now_ms: i64) {
        let Some(ts) = record.meta.timestamp else {
            return;
        };
        let sr = SideRecord {
            ts,
            data: record.data.clone(),
        };
        match self.mode {
            SideMode::Unbounded => self.latest_unbounded = Some(sr),
            SideMode::Bounded { max_buffer_ms } => {
                let pos = self.window.iter().position(|r| r.ts > ts).unwrap_or(self.window.len());
                self.window.insert(pos, sr);
                self.trim(now_ms, max_buffer_ms);
            }
        }
    }

    fn trim(&mut self, now_ms: i64, max_buffer_ms: i64) {
        while let Some(front) = self.window.front() {
            if now_ms - front.ts > max_buffer_ms {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn select(&self, t: i64, match_tolerance_ms: i64) -> Option<(i64, IndexMap<String, Value>)> {
        match self.mode {
            SideMode::Unbounded => self.latest_unbounded.as_ref().map(|r| (r.ts, r.data.clone())),
            SideMode::Bounded { .. } => {
                let nearest = self.window.iter().min_by_key(|r| (r.ts - t).abs())?;
                if (nearest.ts - t).abs() <= match_tolerance_ms {
                    return Some((nearest.ts, nearest.data.clone()));
                }

                let before = self.window.iter().rev().find(|r| r.ts <= t);
                let after = self.window.iter().find(|r| r.ts > t);

                match (before, after) {
                    (Some(b), Some(a)) if a.ts > b.ts => {
                        let ratio = (t - b.ts) as f64 / (a.ts - b.ts) as f64;
                        let mut merged = b.data.clone();
                        for (k, bv) in &b.data {
                            if let Some(av) = a.data.get(k) {
                                if let (Some(bf), Some(af)) = (bv.as_f64(), av.as_f64()) {
                                    if bf.is_finite() && af.is_finite() {
                                        merged.insert(k.clone(), Value::F64(bf + (af - bf) * ratio));
                                    }
                                }
                            }
                        }
                        Some((t, merged))
                    }
                    (Some(b), _) => Some((b.ts, b.data.clone())),
                    (None, Some(a)) => Some((a.ts, a.data.clone())),
                    (None, None) => None,
                }
            }
        }
    }
}

/// Drives the N side streams against the primary stream.
pub struct Merge {
    sides: Vec<MergeSide>,
    match_tolerance_ms: i64,
}

impl Merge {
    /// Build a merge with the given sides (in positional order) and the
    /// tolerance below which the nearest side record is used verbatim.
    pub fn new(sides: Vec<MergeSide>, match_tolerance_ms: i64) -> Self {
        Merge { sides, match_tolerance_ms }
    }

    /// Feed one record to side `idx`.
    pub fn ingest_side(&mut self, idx: usize, record: &Record, now_ms: i64) {
        if let Some(side) = self.sides.get_mut(idx) {
            side.ingest(record, now_ms);
        }
    }

    /// Produce the merged output for one primary-stream record. Returns
    /// `None` when the main timestamp is non-numeric, signaling the caller
    /// to pass the record through unchanged (tag still applied by caller).
    pub fn merge_main(&self, main: &Record) -> Record {
        let Some(t) = main.meta.timestamp else {
            return main.clone();
        };

        let mut data = main.data.clone();
        for side in &self.sides {
            if let Some((_, side_data)) = side.select(t, self.match_tolerance_ms) {
                for (k, v) in side_data {
                    data.insert(format!("{k}{}", side.postfix), v);
                }
            }
        }

        let mut out = main.clone();
        out.data = data;
        out.meta.timestamp = Some(t);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side_record(ts: i64, data: serde_json::Value) -> Record {
        tmcp_record::normalize(serde_json::json!({"meta": {"timestamp": ts}, "data": data}))
    }

    fn main_record(ts: i64, data: serde_json::Value) -> Record {
        tmcp_record::normalize(serde_json::json!({"meta": {"timestamp": ts}, "data": data}))
    }

    #[test]
    fn bounded_interpolates_between_brackets() {
        let mut side = MergeSide::new(SideMode::Bounded { max_buffer_ms: 10_000 }, "_1");
        side.ingest(&side_record(980, serde_json::json!({"y": 10})), 1000);
        side.ingest(&side_record(1020, serde_json::json!({"y": 20})), 1020);

        let merge = Merge::new(vec![side], 10);
        let out = merge.merge_main(&main_record(1000, serde_json::json!({"x": 1})));
        assert_eq!(out.data.get("y_1").and_then(|v| v.as_f64()), Some(15.0));
        assert_eq!(out.meta.timestamp, Some(1000));
    }

    #[test]
    fn within_tolerance_uses_nearest_verbatim() {
        let mut side = MergeSide::new(SideMode::Bounded { max_buffer_ms: 10_000 }, "_1");
        side.ingest(&side_record(995, serde_json::json!({"y": 7})), 1000);

        let merge = Merge::new(vec![side], 10);
        let out = merge.merge_main(&main_record(1000, serde_json::json!({"x": 1})));
        assert_eq!(out.data.get("y_1").and_then(|v| v.as_f64()), Some(7.0));
    }

    #[test]
    fn unbounded_holds_last_regardless_of_main_timestamp() {
        let mut side = MergeSide::new(SideMode::Unbounded, "_1");
        side.ingest(&side_record(5, serde_json::json!({"z": 42})), 5);

        let merge = Merge::new(vec![side], 10);
        let out = merge.merge_main(&main_record(1_000_000, serde_json::json!({"x": 1})));
        assert_eq!(out.data.get("z_1").and_then(|v| v.as_f64()), Some(42.0));
        assert_eq!(out.meta.timestamp, Some(1_000_000));
    }

    #[test]
    fn non_numeric_main_timestamp_passes_through_unmerged() {
        let side = MergeSide::new(SideMode::Unbounded, "_1");
        let merge = Merge::new(vec![side], 10);
        let main = tmcp_record::normalize(serde_json::json!({"data": {"x": 1}}));
        let out = merge.merge_main(&main);
        assert_eq!(out.data.get("x_1"), None);
        assert_eq!(out.meta.timestamp, None);
    }

    #[test]
    fn bounded_window_trims_entries_older_than_max_buffer() {
        let mut side = MergeSide::new(SideMode::Bounded { max_buffer_ms: 100 }, "_1");
        side.ingest(&side_record(0, serde_json::json!({"y": 1})), 0);
        side.ingest(&side_record(500, serde_json::json!({"y": 2})), 500);
        assert_eq!(side.window.len(), 1);
    }
}
