use super::RespValue;
use crate::error::{ClusterError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Largest bulk string or array length accepted from a peer (512 MiB, the
/// Redis `proto-max-bulk-len` default).
pub const MAX_FRAME_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted from a peer.
pub const MAX_DEPTH: usize = 64;

/// Elements preallocated for an array before any of them is parsed.
const MAX_PREALLOC: usize = 1024;

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(parts: &[&[u8]], out: &mut BytesMut) {
    // Array header: *<count>\r\n
    out.put_slice(format!("*{}\r\n", parts.len()).as_bytes());

    // Each argument as bulk string: $<len>\r\n<data>\r\n
    for part in parts {
        out.put_slice(format!("${}\r\n", part.len()).as_bytes());
        out.put_slice(part);
        out.put_slice(b"\r\n");
    }
}

/// Try to parse one complete frame from the start of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the value and the
/// number of bytes it occupied.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
    parse_value(buf, 0, 0)
}

fn parse_value(buf: &[u8], pos: usize, depth: usize) -> Result<Option<(RespValue, usize)>> {
    let Some((line, next)) = read_line(buf, pos) else {
        return Ok(None);
    };
    if line.is_empty() {
        return Err(ClusterError::Protocol("empty RESP line".to_string()));
    }

    let content = &line[1..];
    match line[0] {
        b'+' => Ok(Some((
            RespValue::SimpleString(String::from_utf8_lossy(content).into_owned()),
            next,
        ))),
        b'-' => Ok(Some((
            RespValue::Error(String::from_utf8_lossy(content).into_owned()),
            next,
        ))),
        b':' => Ok(Some((RespValue::Integer(parse_int(content)?), next))),
        b'$' => {
            let len = parse_int(content)?;
            if len < 0 {
                return Ok(Some((RespValue::BulkString(None), next)));
            }
            let len = checked_len(len, "bulk string")?;
            if buf.len() < next + len + 2 {
                return Ok(None);
            }
            if &buf[next + len..next + len + 2] != b"\r\n" {
                return Err(ClusterError::Protocol(
                    "bulk string not terminated by CRLF".to_string(),
                ));
            }
            let data = Bytes::copy_from_slice(&buf[next..next + len]);
            Ok(Some((RespValue::BulkString(Some(data)), next + len + 2)))
        }
        b'*' => {
            let count = parse_int(content)?;
            if count < 0 {
                return Ok(Some((RespValue::Array(None), next)));
            }
            let count = checked_len(count, "array")?;
            if depth >= MAX_DEPTH {
                return Err(ClusterError::Protocol(format!(
                    "arrays nested deeper than {}",
                    MAX_DEPTH
                )));
            }
            let mut elements = Vec::with_capacity(count.min(MAX_PREALLOC));
            let mut pos = next;
            for _ in 0..count {
                match parse_value(buf, pos, depth + 1)? {
                    Some((value, after)) => {
                        elements.push(value);
                        pos = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(Some(elements)), pos)))
        }
        other => Err(ClusterError::Protocol(format!(
            "invalid RESP type byte: {:?}",
            other as char
        ))),
    }
}

fn checked_len(len: i64, what: &str) -> Result<usize> {
    if len > MAX_FRAME_LEN {
        return Err(ClusterError::Protocol(format!(
            "{} length {} exceeds {}",
            what, len, MAX_FRAME_LEN
        )));
    }
    Ok(len as usize)
}

fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    if pos >= buf.len() {
        return None;
    }
    let end = buf[pos..].windows(2).position(|w| w == b"\r\n")?;
    Some((&buf[pos..pos + end], pos + end + 2))
}

fn parse_int(content: &[u8]) -> Result<i64> {
    std::str::from_utf8(content)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ClusterError::Protocol(format!(
                "invalid integer: {:?}",
                String::from_utf8_lossy(content)
            ))
        })
}
