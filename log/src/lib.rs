//! Level-filtered diagnostics with the stable `<moduleName>(<configPath|no-conf>)`
//! prefix, plus a 1000ms throughput-statistics reporter.
//!
//! All diagnostics go to stderr via [`tracing`]; this crate layers the
//! required prefix and level-filter semantics (`none < error < warn < info`)
//! on top rather than replacing it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tmcp_record::Record;

/// Verbosity filter for `--verbose-log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// No diagnostics at all
    None,
    /// Errors only
    Error,
    /// Errors and warnings
    #[default]
    Warn,
    /// Errors, warnings, and info (including throughput stats)
    Info,
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// A module-scoped logger carrying the stable diagnostic prefix.
#[derive(Clone)]
pub struct Logger {
    prefix: String,
    level: LogLevel,
}

impl Logger {
    /// Build a logger for `module_name`, scoped to `config_path` (or
    /// `"no-conf"` when the module isn't running off a config file).
    pub fn new(module_name: &str, config_path: Option<&str>, level: LogLevel) -> Self {
        let scope = config_path.unwrap_or("no-conf");
        Logger {
            prefix: format!("{module_name}({scope})"),
            level,
        }
    }

    /// Log at error level.
    pub fn error(&self, msg: &str) {
        if self.level >= LogLevel::Error {
            tracing::error!("{}: {}", self.prefix, msg);
        }
    }

    /// Log at warn level.
    pub fn warn(&self, msg: &str) {
        if self.level >= LogLevel::Warn {
            tracing::warn!("{}: {}", self.prefix, msg);
        }
    }

    /// Log at info level.
    pub fn info(&self, msg: &str) {
        if self.level >= LogLevel::Info {
            tracing::info!("{}: {}", self.prefix, msg);
        }
    }
}

/// Install a process-wide `tracing-subscriber` writing to stderr. Call once
/// from each module's `main`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Per-interval throughput counters: rate, average delay, and the most
/// recently observed pipeline tag chain, as surfaced by `--verbose`.
#[derive(Default)]
pub struct ThroughputStats {
    count: AtomicU64,
    delay_sum_ms: AtomicU64,
    delay_count: AtomicU64,
    last_pipeline: std::sync::Mutex<Vec<String>>,
}

impl ThroughputStats {
    /// Create a fresh counter set.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one processed record.
    pub fn record(&self, record: &Record, now_ms: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if let Some(ts) = record.meta.timestamp {
            let delay = (now_ms - ts).max(0) as u64;
            self.delay_sum_ms.fetch_add(delay, Ordering::Relaxed);
            self.delay_count.fetch_add(1, Ordering::Relaxed);
        }
        if !record.meta.pipeline.is_empty() {
            *self.last_pipeline.lock().expect("stats mutex poisoned") = record.meta.pipeline.clone();
        }
    }

    /// Snapshot `(messages emitted since last call, average delay ms, last pipeline chain)`,
    /// resetting the message counter (but not the running delay average).
    pub fn snapshot_and_reset_count(&self) -> (u64, f64, Vec<String>) {
        let count = self.count.swap(0, Ordering::Relaxed);
        let delay_sum = self.delay_sum_ms.load(Ordering::Relaxed);
        let delay_count = self.delay_count.load(Ordering::Relaxed).max(1);
        let avg_delay = delay_sum as f64 / delay_count as f64;
        let pipeline = self.last_pipeline.lock().expect("stats mutex poisoned").clone();
        (count, avg_delay, pipeline)
    }
}

/// Spawn the 1000ms throughput reporter task. Only meaningful when verbose
/// metrics are enabled; callers gate this behind `--verbose`.
pub fn spawn_throughput_reporter(logger: Logger, stats: Arc<ThroughputStats>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(1000));
        loop {
            ticker.tick().await;
            let (count, avg_delay, pipeline) = stats.snapshot_and_reset_count();
            logger.info(&format!(
                "rate={count}msg/s avg_delay={avg_delay:.1}ms last_pipeline={}",
                pipeline.join(">")
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_matches_spec() {
        assert!(LogLevel::None < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
    }

    #[test]
    fn throughput_stats_track_count_and_delay() {
        let stats = ThroughputStats::new();
        let mut rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 1}}));
        rec.meta.timestamp = Some(900);
        stats.record(&rec, 1000);
        let (count, avg_delay, _) = stats.snapshot_and_reset_count();
        assert_eq!(count, 1);
        assert_eq!(avg_delay, 100.0);
    }
}
