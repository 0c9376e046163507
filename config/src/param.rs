//! Declarative specs for registered parameters, positionals, and
//! config-file fields.

/// A declared CLI/ENV parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Long flag name, without the leading `--` (e.g. `"interval-ms"`)
    pub long: String,
    /// Optional one-character short flag (e.g. `Some('v')` for `-v`)
    pub short: Option<char>,
    /// Optional environment variable consulted after CLI, before default
    pub env: Option<String>,
    /// Default value, used as a plain string and parsed per `takes_value`
    pub default: Option<String>,
    /// Whether this flag expects `--flag value` / `--flag=value`, vs. being boolean
    pub takes_value: bool,
    /// Whether a `--no-<long>` negative form exists (boolean params only)
    pub negatable: bool,
    /// Whether resolution without a value is a fatal usage error
    pub required: bool,
    /// Whether [`crate::Accessor::override_value`] is permitted at runtime
    pub mutable: bool,
    /// One-line description shown in auto-generated help
    pub description: String,
}

impl ParamSpec {
    /// Start building a value-expecting parameter.
    pub fn value(long: impl Into<String>, description: impl Into<String>) -> Self {
        ParamSpec {
            long: long.into(),
            short: None,
            env: None,
            default: None,
            takes_value: true,
            negatable: false,
            required: false,
            mutable: true,
            description: description.into(),
        }
    }

    /// Start building a boolean flag (`--flag` / `--no-flag`).
    pub fn flag(long: impl Into<String>, description: impl Into<String>) -> Self {
        ParamSpec {
            long: long.into(),
            short: None,
            env: None,
            default: Some("false".to_string()),
            takes_value: false,
            negatable: true,
            required: false,
            mutable: true,
            description: description.into(),
        }
    }

    /// Set the short flag.
    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    /// Set the environment variable name.
    pub fn env(mut self, name: impl Into<String>) -> Self {
        self.env = Some(name.into());
        self
    }

    /// Set the default value (as its string form).
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Mark this parameter required (no usable default).
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark this parameter immutable: [`crate::Accessor::override_value`] will reject it.
    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }
}

/// A slot in an ordered positional schema.
#[derive(Debug, Clone)]
pub struct PositionalSlot {
    /// Slot name, used for `positionals.<name>` lookups and in help text
    pub name: String,
    /// Whether this slot must be filled
    pub required: bool,
    /// Whether this slot (must be the last one) absorbs all remaining positionals
    pub variadic: bool,
}

impl PositionalSlot {
    /// A single required positional.
    pub fn required(name: impl Into<String>) -> Self {
        PositionalSlot {
            name: name.into(),
            required: true,
            variadic: false,
        }
    }

    /// A single optional positional.
    pub fn optional(name: impl Into<String>) -> Self {
        PositionalSlot {
            name: name.into(),
            required: false,
            variadic: false,
        }
    }

    /// A variadic positional; only valid as the last slot in a schema.
    pub fn variadic(name: impl Into<String>) -> Self {
        PositionalSlot {
            name: name.into(),
            required: false,
            variadic: true,
        }
    }
}

/// A declared dotted-path config-file field.
#[derive(Debug, Clone)]
pub struct ConfigFieldSpec {
    /// Dotted path, matched case-insensitively (e.g. `"gate.max_age_ms"`)
    pub path: String,
    /// Default JSON value used when the field is absent
    pub default: Option<serde_json::Value>,
    /// Whether absence without a default is a fatal usage error
    pub required: bool,
    /// One-line description shown in the config schema skeleton
    pub description: String,
    /// Whether runtime override is permitted
    pub mutable: bool,
}

impl ConfigFieldSpec {
    /// Declare a field at `path` with `description`.
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        ConfigFieldSpec {
            path: path.into(),
            default: None,
            required: false,
            description: description.into(),
            mutable: true,
        }
    }

    /// Set the default value.
    pub fn default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark immutable.
    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }
}
