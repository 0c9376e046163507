//! The logical-delay primitive (spec 4.9): defers emission by a fixed
//! logical delay, ordered by a monotonic input watermark, flushed
//! unconditionally on EOF.

use std::collections::VecDeque;

use tmcp_record::Record;

struct Buffered {
    ts_out: i64,
    record: Record,
}

/// Logical-delay buffer. `D` is the configured delay; the watermark `W`
/// only ever advances.
pub struct Delay {
    delay_ms: i64,
    watermark: i64,
    buffer: VecDeque<Buffered>,
}

impl Delay {
    /// Build a delay buffer for delay `delay_ms`.
    pub fn new(delay_ms: i64) -> Self {
        Delay {
            delay_ms,
            watermark: i64::MIN,
            buffer: VecDeque::new(),
        }
    }

    /// Ingest one input record: computes `tsIn`, advances the watermark,
    /// and inserts a deep copy stamped with `tsOut = tsIn + D` in ascending
    /// `tsOut` order.
    pub fn ingest(&mut self, record: Record, now_ms: i64) {
        let ts_in = record.meta.timestamp.unwrap_or(now_ms);
        self.watermark = self.watermark.max(ts_in);
        let ts_out = ts_in + self.delay_ms;
        let pos = self.buffer.iter().position(|b| b.ts_out > ts_out).unwrap_or(self.buffer.len());
        self.buffer.insert(pos, Buffered { ts_out, record });
    }

    /// Drain every buffered item whose `tsOut <= W`, stamping
    /// `meta.timestamp = tsOut`. Order is ascending `tsOut`.
    pub fn drain_ready(&mut self) -> Vec<Record> {
        let mut out = Vec::new();
        while let Some(front) = self.buffer.front() {
            if front.ts_out <= self.watermark {
                let mut item = self.buffer.pop_front().expect("front just checked").record;
                item.meta.timestamp = Some(front.ts_out);
                out.push(item);
            } else {
                break;
            }
        }
        out
    }

    /// Unconditionally flush the entire buffer, in ascending `tsOut`
    /// order, regardless of the watermark. Called on stdin EOF.
    pub fn flush_all(&mut self) -> Vec<Record> {
        let mut out = Vec::with_capacity(self.buffer.len());
        while let Some(front) = self.buffer.pop_front() {
            let ts_out = front.ts_out;
            let mut item = front.record;
            item.meta.timestamp = Some(ts_out);
            out.push(item);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ts: i64, data: serde_json::Value) -> Record {
        tmcp_record::normalize(serde_json::json!({"meta": {"timestamp": ts}, "data": data}))
    }

    #[test]
    fn eof_flush_emits_everything_in_order_regardless_of_watermark() {
        let mut delay = Delay::new(50);
        delay.ingest(rec(1000, serde_json::json!({"a": 1})), 1000);
        delay.ingest(rec(1010, serde_json::json!({"a": 2})), 1010);

        assert!(delay.drain_ready().is_empty());

        let flushed = delay.flush_all();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].meta.timestamp, Some(1050));
        assert_eq!(flushed[1].meta.timestamp, Some(1060));
    }

    #[test]
    fn drains_only_once_watermark_covers_ts_out() {
        let mut delay = Delay::new(50);
        delay.ingest(rec(1000, serde_json::json!({"a": 1})), 1000);
        assert!(delay.drain_ready().is_empty());

        delay.ingest(rec(1050, serde_json::json!({"a": 2})), 1050);
        let ready = delay.drain_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].meta.timestamp, Some(1050));
    }

    #[test]
    fn missing_timestamp_uses_now_for_ts_in() {
        let mut delay = Delay::new(10);
        let input = tmcp_record::normalize(serde_json::json!({"data": {"a": 1}}));
        delay.ingest(input, 100);
        let flushed = delay.flush_all();
        assert_eq!(flushed[0].meta.timestamp, Some(110));
    }
}
