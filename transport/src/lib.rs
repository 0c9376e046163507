//! The transport layer: wire framing (NDJSON / MessagePack), per-channel
//! lifecycle policy, FIFO-aware I/O with reconnect semantics, and process
//! termination.
//!
//! Every module binary reads records from one or more [`io::Source`]s,
//! decodes them with [`protocol`], and writes results to one or more
//! [`io::Target`]s through [`io::write`] (or, for detached side channels,
//! [`io::FifoWriter`]). [`policy`] resolves the `exit_on_close`/`retry`
//! bits that govern what happens at the edges of that stream.

pub mod error;
pub mod io;
pub mod policy;
pub mod protocol;
pub mod termination;

pub use error::TransportError;
pub use io::{ensure_path_exists, read, write, FifoWriter, ReadOptions, Source, Target, WriteOptions};
pub use policy::{resolve as resolve_policy, ChannelPolicy, Resolution as PolicyResolution};
pub use protocol::{
    decode_msgpack_object, decode_ndjson_line, encode_msgpack_object, encode_ndjson_line, MsgpackDecodeError, Protocol,
};
pub use termination::{terminate, TerminationMode};
