//! Process-wide tagging flag.
//!
//! The `--do-tag` / `--no-do-tag` CLI flag is global to a process, so it is
//! exposed here as a service rather than threaded through every
//! [`crate::create_meta`] / [`crate::append_tag`] call, per the design
//! notes' guidance on process-wide flag side effects.

use std::sync::atomic::{AtomicBool, Ordering};

static TAGGING_ENABLED: AtomicBool = AtomicBool::new(true);

/// Enable or disable provenance tagging process-wide. Called once at
/// startup from the resolved `--do-tag` parameter.
pub fn set_tagging_enabled(enabled: bool) {
    TAGGING_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether `meta.pipeline` appends are currently active.
pub fn is_tagging_enabled() -> bool {
    TAGGING_ENABLED.load(Ordering::Relaxed)
}
