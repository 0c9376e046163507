//! Wire encodings: NDJSON (one JSON document per line) and a length-prefixed
//! MessagePack framing of the same canonical record shape.

use tmcp_record::Record;

use crate::error::TransportError;

/// Selects the wire format for one direction (`--in-protocol` / `--out-protocol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// One JSON document per line
    #[default]
    Ndjson,
    /// Concatenated self-delimiting MessagePack objects
    Msgpack,
}

impl std::str::FromStr for Protocol {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ndjson" => Ok(Protocol::Ndjson),
            "msgpack" => Ok(Protocol::Msgpack),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

/// Decode one NDJSON line (without its trailing `\n`) into a [`Record`].
/// Malformed lines are the caller's responsibility to warn-and-skip.
pub fn decode_ndjson_line(line: &str, channel: &str) -> Result<Record, TransportError> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| TransportError::MalformedNdjson(channel.to_string(), e))?;
    Ok(tmcp_record::normalize(value))
}

/// Encode a [`Record`] as a single NDJSON line, including the trailing `\n`.
pub fn encode_ndjson_line(record: &Record) -> String {
    format!("{}\n", serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string()))
}

/// Why [`decode_msgpack_object`] failed to produce an object.
pub enum MsgpackDecodeError {
    /// `buf` doesn't yet hold a complete object; the caller should read more
    /// bytes and retry rather than treat this as a framing error.
    Truncated,
    /// The bytes buffered are not a valid MessagePack object at all.
    Corrupt(TransportError),
}

/// Decode one self-delimiting MessagePack object from the front of `buf`,
/// returning the record and the number of bytes consumed.
pub fn decode_msgpack_object(buf: &[u8], channel: &str) -> Result<(Record, usize), MsgpackDecodeError> {
    let mut cursor = std::io::Cursor::new(buf);
    let value: rmpv::Value = rmpv::decode::read_value(&mut cursor).map_err(|e| {
        if is_truncation(&e) {
            MsgpackDecodeError::Truncated
        } else {
            MsgpackDecodeError::Corrupt(TransportError::MalformedMsgpack(channel.to_string(), e.to_string()))
        }
    })?;
    let consumed = cursor.position() as usize;
    let json = rmpv::ext::to_value(value)
        .or_else(|_| Ok::<_, TransportError>(serde_json::Value::Null))
        .unwrap_or(serde_json::Value::Null);
    Ok((tmcp_record::normalize(json), consumed))
}

/// `true` when a decode error stems from running out of buffered bytes
/// (the object's prefix is valid so far, it just isn't complete yet) rather
/// than a malformed marker or data byte.
fn is_truncation(e: &rmpv::decode::Error) -> bool {
    let io_err = match e {
        rmpv::decode::Error::InvalidMarkerRead(io_err) => io_err,
        rmpv::decode::Error::InvalidDataRead(io_err) => io_err,
    };
    io_err.kind() == std::io::ErrorKind::UnexpectedEof
}

/// Encode a [`Record`] as a single MessagePack object.
pub fn encode_msgpack_object(record: &Record) -> Vec<u8> {
    let json = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
    rmp_serde::to_vec(&json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_round_trip() {
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 1}, "meta": {"timestamp": 5}}));
        let line = encode_ndjson_line(&rec);
        let decoded = decode_ndjson_line(line.trim_end(), "stdin").unwrap();
        assert_eq!(rec, decoded);
    }

    #[test]
    fn malformed_ndjson_line_errors_without_panicking() {
        let err = decode_ndjson_line("{not json", "stdin").unwrap_err();
        assert!(matches!(err, TransportError::MalformedNdjson(_, _)));
    }

    #[test]
    fn msgpack_round_trip() {
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 1.5}}));
        let bytes = encode_msgpack_object(&rec);
        let (decoded, consumed) = decode_msgpack_object(&bytes, "side:0").ok().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.data.get("x").and_then(|v| v.as_f64()), Some(1.5));
    }

    #[test]
    fn msgpack_truncated_object_is_not_corrupt() {
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 1}}));
        let bytes = encode_msgpack_object(&rec);
        let prefix = &bytes[..bytes.len() - 1];
        assert!(matches!(decode_msgpack_object(prefix, "side:0"), Err(MsgpackDecodeError::Truncated)));
    }

    #[test]
    fn msgpack_corrupt_marker_is_reported() {
        let garbage = [0xc1u8; 4];
        assert!(matches!(decode_msgpack_object(&garbage, "side:0"), Err(MsgpackDecodeError::Corrupt(_))));
    }
}
