//! Transport-level error taxonomy.

use thiserror::Error;

/// Errors surfaced by the transport layer. Most failures here are swallowed
/// or logged rather than propagated; this type exists for the cases that do
/// need to reach the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failure opening or operating on a channel
    #[error("I/O error on channel '{0}': {1}")]
    Io(String, #[source] std::io::Error),
    /// NDJSON line failed to parse as JSON (non-fatal; the line is skipped)
    #[error("malformed NDJSON line on '{0}': {1}")]
    MalformedNdjson(String, #[source] serde_json::Error),
    /// MessagePack object failed to decode (non-fatal; decoding continues)
    #[error("malformed MessagePack object on '{0}': {1}")]
    MalformedMsgpack(String, String),
    /// The channel's read side hit EOF and `exit_on_close` is set
    #[error("end of input on '{0}'")]
    ExitOnClose(String),
}
