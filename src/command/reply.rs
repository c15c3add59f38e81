use crate::error::{ClusterError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;

/// A destination a reply can be decoded into.
///
/// Error replies never reach a receiver; they are turned into errors by
/// [`Cmd::run`](super::Cmd).
pub trait FromReply {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()>;
}

pub(crate) fn unexpected(expected: &str, reply: &RespValue) -> ClusterError {
    ClusterError::Protocol(format!("cannot decode {} into {}", reply.kind(), expected))
}

impl FromReply for RespValue {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = reply;
        Ok(())
    }
}

impl FromReply for String {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = match reply {
            RespValue::SimpleString(s) => s,
            RespValue::BulkString(Some(data)) => String::from_utf8(data.to_vec())
                .map_err(|e| ClusterError::Protocol(format!("invalid UTF-8: {}", e)))?,
            RespValue::Integer(i) => i.to_string(),
            other => return Err(unexpected("string", &other)),
        };
        Ok(())
    }
}

impl FromReply for Bytes {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = match reply {
            RespValue::BulkString(Some(data)) => data,
            RespValue::SimpleString(s) => Bytes::from(s),
            other => return Err(unexpected("bytes", &other)),
        };
        Ok(())
    }
}

impl FromReply for i64 {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = reply.as_i64().ok_or_else(|| unexpected("integer", &reply))?;
        Ok(())
    }
}

impl FromReply for u64 {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = reply
            .as_i64()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| unexpected("unsigned integer", &reply))?;
        Ok(())
    }
}

impl FromReply for bool {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = match &reply {
            RespValue::Integer(i) => *i != 0,
            RespValue::SimpleString(s) if s == "OK" => true,
            _ => return Err(unexpected("bool", &reply)),
        };
        Ok(())
    }
}

impl<T: FromReply + Default> FromReply for Option<T> {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        if reply.is_null() {
            *self = None;
            return Ok(());
        }
        let mut value = T::default();
        value.set_from_reply(reply)?;
        *self = Some(value);
        Ok(())
    }
}

impl<T: FromReply + Default> FromReply for Vec<T> {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        self.clear();
        match reply {
            RespValue::Array(Some(items)) => {
                self.reserve(items.len());
                for item in items {
                    let mut value = T::default();
                    value.set_from_reply(item)?;
                    self.push(value);
                }
                Ok(())
            }
            RespValue::Array(None) | RespValue::BulkString(None) => Ok(()),
            other => Err(unexpected("array", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_from_bulk_and_simple() {
        let mut s = String::new();
        s.set_from_reply(RespValue::bulk_string("alice")).unwrap();
        assert_eq!(s, "alice");
        s.set_from_reply(RespValue::simple_string("PONG")).unwrap();
        assert_eq!(s, "PONG");
        assert!(s.set_from_reply(RespValue::null_bulk_string()).is_err());
    }

    #[test]
    fn test_optional_and_list_receivers() {
        let mut maybe: Option<String> = Some("stale".to_string());
        maybe.set_from_reply(RespValue::null_bulk_string()).unwrap();
        assert_eq!(maybe, None);

        let mut list: Vec<i64> = vec![9];
        list.set_from_reply(RespValue::array(vec![
            RespValue::integer(1),
            RespValue::bulk_string("2"),
        ]))
        .unwrap();
        assert_eq!(list, vec![1, 2]);
    }

    #[test]
    fn test_integer_mismatch() {
        let mut n = 0u64;
        assert!(n.set_from_reply(RespValue::integer(-1)).is_err());
        assert!(n.set_from_reply(RespValue::array(vec![])).is_err());
        n.set_from_reply(RespValue::integer(12)).unwrap();
        assert_eq!(n, 12);
    }
}
