//! Canonical record shape and normalization — the leaf layer every other
//! crate in this workspace builds on.
//!
//! ```
//! use tmcp_record::{normalize, create_meta, append_tag};
//!
//! let mut rec = normalize(serde_json::json!(5));
//! assert_eq!(rec.data.get("value"), Some(&tmcp_record::Value::I64(5)));
//!
//! rec.meta = create_meta("gat");
//! append_tag(&mut rec.meta, "min");
//! assert_eq!(rec.meta.pipeline, vec!["gat".to_string(), "min".to_string()]);
//! ```

mod meta;
mod record;
mod tagging;
mod value;

pub use meta::Meta;
pub use record::{normalize, Record};
pub use tagging::{is_tagging_enabled, set_tagging_enabled};
pub use value::Value;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Build a fresh [`Meta`] stamped with the current time, honoring the
/// process-wide tagging flag (see [`is_tagging_enabled`]).
pub fn create_meta(tag: &str) -> Meta {
    Meta::created(tag, now_ms(), is_tagging_enabled())
}

/// Append `tag` to `meta.pipeline`, honoring the process-wide tagging flag.
pub fn append_tag(meta: &mut Meta, tag: &str) {
    meta.append_tag(tag, is_tagging_enabled());
}
