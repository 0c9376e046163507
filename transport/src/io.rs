//! Read and write endpoints: stdin/stdout/stderr, numeric file descriptors,
//! and FIFO/file paths, with the NDJSON/MessagePack framing from
//! [`crate::protocol`] and per-channel FIFO reconnect behavior.

use std::future::Future;
use std::os::fd::{FromRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::fcntl::{self, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};

use tmcp_log::Logger;
use tmcp_record::Record;

use crate::error::TransportError;
use crate::policy::ChannelPolicy;
use crate::protocol::{decode_msgpack_object, decode_ndjson_line, encode_msgpack_object, encode_ndjson_line, MsgpackDecodeError, Protocol};
use crate::termination::{terminate, TerminationMode};

/// Where a read channel's bytes come from.
pub enum Source {
    /// Process stdin
    Stdin,
    /// An already-open file descriptor
    Fd(RawFd),
    /// A path, opened as a regular file or FIFO
    Path(PathBuf),
}

/// Where a write channel's bytes go.
pub enum Target {
    /// Process stdout
    Stdout,
    /// Process stderr
    Stderr,
    /// An already-open file descriptor
    Fd(RawFd),
    /// A path, opened as a regular file or FIFO
    Path(PathBuf),
}

/// Options controlling one [`read`] call.
pub struct ReadOptions {
    /// Channel identifier, used for logging and policy lookups
    pub channel_id: String,
    /// Wire format to decode
    pub protocol: Protocol,
    /// Effective per-channel policy (already resolved by the caller)
    pub policy: ChannelPolicy,
    /// How to terminate the process on a fatal close
    pub termination: TerminationMode,
    /// Echo every decoded record to the diagnostic stream
    pub verbose_input: bool,
    /// Logger used for warnings, errors, and verbose echo
    pub logger: Logger,
}

/// Read every record from `source` until EOF, invoking `on_record` for each.
/// Returns `Ok(())` on EOF when `options.policy.exit_on_close` is `false`;
/// otherwise the process is terminated directly rather than returning, since
/// there is no cooperative cancellation token threaded through callers.
pub async fn read<F, Fut>(source: Source, options: ReadOptions, on_record: F) -> Result<(), TransportError>
where
    F: FnMut(Record) -> Fut,
    Fut: Future<Output = ()>,
{
    let reader = open_read(source, &options.channel_id).await?;
    match options.protocol {
        Protocol::Ndjson => read_ndjson(reader, options, on_record).await,
        Protocol::Msgpack => read_msgpack(reader, options, on_record).await,
    }
}

async fn open_read(source: Source, channel_id: &str) -> Result<Box<dyn AsyncRead + Unpin + Send>, TransportError> {
    match source {
        Source::Stdin => Ok(Box::new(tokio::io::stdin())),
        Source::Fd(fd) => {
            // SAFETY: caller guarantees `fd` is a valid, owned, open descriptor.
            let std_file = unsafe { std::fs::File::from_raw_fd(fd) };
            Ok(Box::new(tokio::fs::File::from_std(std_file)))
        }
        Source::Path(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| TransportError::Io(channel_id.to_string(), e))?;
            Ok(Box::new(file))
        }
    }
}

async fn read_ndjson<F, Fut>(
    reader: Box<dyn AsyncRead + Unpin + Send>,
    options: ReadOptions,
    mut on_record: F,
) -> Result<(), TransportError>
where
    F: FnMut(Record) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decode_ndjson_line(&line, &options.channel_id) {
                    Ok(record) => {
                        if options.verbose_input {
                            options
                                .logger
                                .info(&format!("in[{}]: {}", options.channel_id, encode_ndjson_line(&record).trim_end()));
                        }
                        on_record(record).await;
                    }
                    Err(e) => options.logger.warn(&e.to_string()),
                }
            }
            Ok(None) => return on_eof(&options),
            Err(e) => return Err(TransportError::Io(options.channel_id.clone(), e)),
        }
    }
}

async fn read_msgpack<F, Fut>(
    mut reader: Box<dyn AsyncRead + Unpin + Send>,
    options: ReadOptions,
    mut on_record: F,
) -> Result<(), TransportError>
where
    F: FnMut(Record) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        // Drain any complete objects already buffered before reading more.
        loop {
            match decode_msgpack_object(&buf, &options.channel_id) {
                Ok((record, consumed)) => {
                    buf.drain(..consumed);
                    if options.verbose_input {
                        options.logger.info(&format!("in[{}]: {:?}", options.channel_id, record));
                    }
                    on_record(record).await;
                }
                // The object isn't fully buffered yet; read more bytes and
                // retry rather than treating the prefix as corrupt.
                Err(MsgpackDecodeError::Truncated) => break,
                Err(MsgpackDecodeError::Corrupt(e)) => {
                    options.logger.error(&e.to_string());
                    // Drop one byte to resynchronize past the bad prefix.
                    if buf.is_empty() {
                        break;
                    }
                    buf.remove(0);
                }
            }
        }
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| TransportError::Io(options.channel_id.clone(), e))?;
        if n == 0 {
            return on_eof(&options);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn on_eof(options: &ReadOptions) -> Result<(), TransportError> {
    if options.policy.exit_on_close {
        options.logger.info(&format!("EOF on '{}', terminating", options.channel_id));
        terminate(options.termination, 0)
    } else {
        Ok(())
    }
}

/// Options controlling one [`write`] call.
pub struct WriteOptions {
    /// Channel identifier, used for logging and policy lookups
    pub channel_id: String,
    /// Wire format to encode
    pub protocol: Protocol,
    /// Effective per-channel policy (already resolved by the caller)
    pub policy: ChannelPolicy,
    /// How to terminate the process on a fatal close
    pub termination: TerminationMode,
    /// Echo every encoded record to the diagnostic stream
    pub verbose_output: bool,
    /// Logger used for warnings, errors, and verbose echo
    pub logger: Logger,
}

/// Write one record to `target`. Transient errors on a `retry=true`
/// channel are swallowed; fatal closes on an `exit_on_close=true` channel
/// terminate the process.
pub async fn write(record: &Record, target: Target, options: WriteOptions) -> Result<(), TransportError> {
    let bytes = match options.protocol {
        Protocol::Ndjson => encode_ndjson_line(record).into_bytes(),
        Protocol::Msgpack => encode_msgpack_object(record),
    };
    if options.verbose_output {
        options
            .logger
            .info(&format!("out[{}]: {}", options.channel_id, encode_ndjson_line(record).trim_end()));
    }

    let result = write_bytes(target, &bytes).await;
    match result {
        Ok(()) => Ok(()),
        Err(e) if is_transient(&e) && options.policy.retry => Ok(()),
        Err(e) if is_transient(&e) && options.policy.exit_on_close => {
            options.logger.info(&format!("broken pipe on '{}', terminating", options.channel_id));
            terminate(options.termination, 0)
        }
        Err(e) => {
            options.logger.error(&format!("write error on '{}': {e}", options.channel_id));
            Err(TransportError::Io(options.channel_id, e))
        }
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::WouldBlock
    ) || e.raw_os_error() == Some(nix::libc::ENXIO)
}

async fn write_bytes(target: Target, bytes: &[u8]) -> std::io::Result<()> {
    match target {
        Target::Stdout => {
            let mut out = tokio::io::stdout();
            out.write_all(bytes).await?;
            out.flush().await
        }
        Target::Stderr => {
            let mut out = tokio::io::stderr();
            out.write_all(bytes).await?;
            out.flush().await
        }
        Target::Fd(fd) => {
            // SAFETY: caller guarantees `fd` is a valid, owned, open descriptor.
            let std_file = unsafe { std::fs::File::from_raw_fd(fd) };
            let mut file = tokio::fs::File::from_std(std_file);
            file.write_all(bytes).await
        }
        Target::Path(path) => {
            let mut file = tokio::fs::OpenOptions::new().write(true).open(&path).await?;
            file.write_all(bytes).await
        }
    }
}

/// A non-blocking writer for side FIFOs used by the split/merge primitives.
///
/// Opens the target with `O_NONBLOCK`; if the kernel reports no reader
/// (`ENXIO`), the connection attempt is deferred and retried every 500ms.
/// Writes made while disconnected are silently discarded.
pub struct FifoWriter {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    next_attempt: Instant,
}

impl FifoWriter {
    /// Create a writer for `path`. The first connection attempt happens on
    /// the first call to [`FifoWriter::write_record`].
    pub fn new(path: PathBuf) -> Self {
        FifoWriter {
            path,
            file: None,
            next_attempt: Instant::now(),
        }
    }

    fn try_connect(&mut self) {
        if self.file.is_some() || Instant::now() < self.next_attempt {
            return;
        }
        match fcntl::open(&self.path, OFlag::O_WRONLY | OFlag::O_NONBLOCK, Mode::empty()) {
            Ok(fd) => {
                if let Ok(flags) = fcntl::fcntl(fd, FcntlArg::F_GETFL) {
                    let cleared = OFlag::from_bits_truncate(flags) & !OFlag::O_NONBLOCK;
                    let _ = fcntl::fcntl(fd, FcntlArg::F_SETFL(cleared));
                }
                // SAFETY: `fd` was just opened by us and is not owned elsewhere.
                let std_file = unsafe { std::fs::File::from_raw_fd(fd) };
                self.file = Some(tokio::fs::File::from_std(std_file));
            }
            Err(_) => {
                self.next_attempt = Instant::now() + Duration::from_millis(500);
            }
        }
    }

    /// Encode and write `record`, or silently discard it while disconnected.
    /// Returns `true` if the write reached the FIFO.
    pub async fn write_record(&mut self, record: &Record, protocol: Protocol) -> bool {
        self.try_connect();
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        let bytes = match protocol {
            Protocol::Ndjson => encode_ndjson_line(record).into_bytes(),
            Protocol::Msgpack => encode_msgpack_object(record),
        };
        match file.write_all(&bytes).await {
            Ok(()) => true,
            Err(_) => {
                self.file = None;
                self.next_attempt = Instant::now() + Duration::from_millis(500);
                false
            }
        }
    }
}

/// Ensure `path` exists as a regular file, creating it empty (with a
/// warning) if absent. Used by the split primitive before opening side targets.
pub fn ensure_path_exists(path: &Path, logger: &Logger) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    logger.warn(&format!("side target '{}' does not exist, creating empty file", path.display()));
    std::fs::File::create(path).map(|_| ())
}
