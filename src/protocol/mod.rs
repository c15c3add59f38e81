//! RESP (Redis Serialization Protocol) values and frame codec.

mod codec;

pub use codec::{encode_command, parse_frame};

use bytes::{BufMut, Bytes, BytesMut};

/// RESP value types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n), `None` for the null bulk string
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...), `None` for the null array
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        RespValue::Error(msg.into())
    }

    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(Some(values))
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// Get as string (for simple string or bulk string)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(Some(b)) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Get as integer. Bulk strings holding a decimal number are accepted too.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            RespValue::BulkString(Some(_)) | RespValue::SimpleString(_) => {
                self.as_str().and_then(|s| s.parse().ok())
            }
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(arr)) => Some(arr),
            _ => None,
        }
    }

    /// Human readable name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(Some(_)) => "bulk string",
            RespValue::BulkString(None) => "null bulk string",
            RespValue::Array(Some(_)) => "array",
            RespValue::Array(None) => "null array",
        }
    }

    /// Serialize the value in RESP2 wire format.
    pub fn write_to(&self, out: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                out.put_u8(b'+');
                out.put_slice(s.as_bytes());
                out.put_slice(b"\r\n");
            }
            RespValue::Error(e) => {
                out.put_u8(b'-');
                out.put_slice(e.as_bytes());
                out.put_slice(b"\r\n");
            }
            RespValue::Integer(i) => {
                out.put_slice(format!(":{}\r\n", i).as_bytes());
            }
            RespValue::BulkString(None) => out.put_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(data)) => {
                out.put_slice(format!("${}\r\n", data.len()).as_bytes());
                out.put_slice(data);
                out.put_slice(b"\r\n");
            }
            RespValue::Array(None) => out.put_slice(b"*-1\r\n"),
            RespValue::Array(Some(values)) => {
                out.put_slice(format!("*{}\r\n", values.len()).as_bytes());
                for value in values {
                    value.write_to(out);
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        self.write_to(&mut out);
        out.freeze()
    }
}
