//! Error taxonomy for the configuration layer. Every variant here is a
//! *configuration error*: fatal at startup, printed with auto-generated
//! usage, non-zero exit.

use thiserror::Error;

/// Errors raised while registering or resolving parameters, positionals,
/// and config-file fields.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Two parameters were registered with the same long name
    #[error("duplicate parameter name: --{0}")]
    DuplicateLongName(String),
    /// Two parameters were registered with the same short name
    #[error("duplicate parameter short name: -{0}")]
    DuplicateShortName(char),
    /// A positional slot other than the last one was marked variadic
    #[error("positional slot '{0}' is variadic but is not the last slot")]
    NonTerminalVariadic(String),
    /// More positionals were supplied on the command line than the schema allows
    #[error("too many positional arguments (expected at most {0})")]
    TooManyPositionals(usize),
    /// A required parameter or positional had no resolved value
    #[error("missing required value for {0}")]
    MissingRequired(String),
    /// A value-expecting flag was the last token, or followed by another flag
    #[error("flag --{0} expects a value")]
    MissingFlagValue(String),
    /// `argv` referenced a flag that was never registered
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    /// A registered field was resolved but the caller tried to override an immutable one
    #[error("field '{0}' is immutable and cannot be overridden at runtime")]
    Immutable(String),
    /// The config file path could not be read
    #[error("unable to read config file '{0}': {1}")]
    UnreadableFile(String, String),
    /// The config file did not parse as JSON
    #[error("malformed JSON in config file '{0}': {1}")]
    MalformedJson(String, String),
    /// `--config-tag`/`defaultScope` selected a subtree that isn't an object
    #[error("config scope '{0}' is not an object")]
    InvalidScope(String),
    /// A `{"$env": "NAME"}` indirection referenced an unset environment variable
    #[error("config field '{0}' references unset environment variable '{1}'")]
    UnsetEnvIndirection(String, String),
}
