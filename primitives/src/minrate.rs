//! The minimum-rate primitive (spec 4.5): guarantees at least one output
//! every `I` ms without ever dropping a real record.

use tmcp_record::Record;

/// Per-instance minimum-rate state. Caches the most recently emitted record
/// so the background timer can clone it forward in time.
pub struct MinRate {
    interval_ms: i64,
    last_emit_wall_ms: i64,
    last_logical_ts: Option<i64>,
    cached: Option<Record>,
}

impl MinRate {
    /// Build a minimum-rate guard for the given interval `I`, in ms.
    pub fn new(interval_ms: i64, now_ms: i64) -> Self {
        MinRate {
            interval_ms,
            last_emit_wall_ms: now_ms,
            last_logical_ts: None,
            cached: None,
        }
    }

    /// How often the background timer should fire: `max(5, I/4)` ms.
    pub fn timer_interval_ms(&self) -> i64 {
        (self.interval_ms / 4).max(5)
    }

    /// Forward a real input record immediately, stamping a missing
    /// timestamp with `now` and caching the result for the clone timer.
    pub fn on_record(&mut self, mut record: Record, now_ms: i64) -> Record {
        let ts = record.meta.timestamp.unwrap_or(now_ms);
        record.meta.timestamp = Some(ts);
        self.last_emit_wall_ms = now_ms;
        self.last_logical_ts = Some(ts);
        self.cached = Some(record.clone());
        record
    }

    /// Called on every timer tick; returns a cloned record when the
    /// interval has elapsed since the last emission (real or cloned).
    pub fn tick(&mut self, now_ms: i64) -> Option<Record> {
        if now_ms - self.last_emit_wall_ms < self.interval_ms {
            return None;
        }
        let cached = self.cached.as_ref()?;
        let last_ts = self.last_logical_ts?;
        let mut clone = cached.clone();
        let next_ts = last_ts + self.interval_ms;
        clone.meta.timestamp = Some(next_ts);
        self.last_emit_wall_ms = now_ms;
        self.last_logical_ts = Some(next_ts);
        self.cached = Some(clone.clone());
        Some(clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_advance_timestamp_by_exactly_interval() {
        let mut mr = MinRate::new(100, 0);
        let input = tmcp_record::normalize(serde_json::json!({"meta": {"timestamp": 1000}, "data": {"x": 7}}));
        let forwarded = mr.on_record(input, 0);
        assert_eq!(forwarded.meta.timestamp, Some(1000));

        assert!(mr.tick(50).is_none());
        let c1 = mr.tick(100).unwrap();
        assert_eq!(c1.meta.timestamp, Some(1100));
        let c2 = mr.tick(200).unwrap();
        assert_eq!(c2.meta.timestamp, Some(1200));
        let c3 = mr.tick(300).unwrap();
        assert_eq!(c3.meta.timestamp, Some(1300));
        assert_eq!(c3.data.get("x").and_then(|v| v.as_f64()), Some(7.0));
    }

    #[test]
    fn missing_timestamp_uses_now() {
        let mut mr = MinRate::new(100, 0);
        let input = tmcp_record::normalize(serde_json::json!({"data": {"x": 1}}));
        let forwarded = mr.on_record(input, 42);
        assert_eq!(forwarded.meta.timestamp, Some(42));
    }

    #[test]
    fn no_clone_before_a_real_record_was_seen() {
        let mut mr = MinRate::new(100, 0);
        assert!(mr.tick(1000).is_none());
    }
}
