//! The runtime-override surface shared by CLI-resolved and config-file-resolved values.

use std::sync::Mutex;

use indexmap::IndexMap;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub(crate) struct FieldMeta {
    pub mutable: bool,
}

/// Options for [`Accessor::get`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// When `true`, bypass any runtime override and return the originally
    /// resolved (CLI/ENV/default, or config-file) value.
    pub original: bool,
}

/// A resolved, overridable set of values, keyed by dotted path
/// (`param.<longname>`, `positionals.<index|name>`, or a config-file path).
///
/// Resolution happened once at `load_*` time; overrides layer on top
/// in-process without touching the underlying resolution.
pub struct Accessor {
    resolved: IndexMap<String, serde_json::Value>,
    meta: IndexMap<String, FieldMeta>,
    overrides: Mutex<IndexMap<String, serde_json::Value>>,
}

impl Accessor {
    pub(crate) fn new(
        resolved: IndexMap<String, serde_json::Value>,
        meta: IndexMap<String, FieldMeta>,
    ) -> Self {
        Accessor {
            resolved,
            meta,
            overrides: Mutex::new(IndexMap::new()),
        }
    }

    /// Look up `path`. Returns the runtime override if one is set (unless
    /// `options.original` is `true`), otherwise the originally resolved value.
    pub fn get(&self, path: &str, options: GetOptions) -> Option<serde_json::Value> {
        if !options.original {
            if let Ok(overrides) = self.overrides.lock() {
                if let Some(v) = overrides.get(path) {
                    return Some(v.clone());
                }
            }
        }
        self.resolved.get(path).cloned()
    }

    /// Set a runtime override for `path`. Fails if the field was registered immutable.
    pub fn override_value(&self, path: &str, value: serde_json::Value) -> Result<(), ConfigError> {
        if let Some(meta) = self.meta.get(path) {
            if !meta.mutable {
                return Err(ConfigError::Immutable(path.to_string()));
            }
        }
        let mut overrides = self.overrides.lock().expect("override mutex poisoned");
        overrides.insert(path.to_string(), value);
        Ok(())
    }

    /// Clear a previously set runtime override for `path`.
    pub fn clear_override(&self, path: &str) {
        let mut overrides = self.overrides.lock().expect("override mutex poisoned");
        overrides.shift_remove(path);
    }

    /// Whether `path` resolved to a value at all (original or overridden).
    pub fn contains(&self, path: &str) -> bool {
        self.resolved.contains_key(path)
            || self
                .overrides
                .lock()
                .map(|o| o.contains_key(path))
                .unwrap_or(false)
    }
}
