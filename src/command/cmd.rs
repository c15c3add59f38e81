use super::{Action, Conn, FromReply};
use crate::cluster::Topology;
use crate::error::{ClusterError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::fmt;

/// A single command: verb, keys, arguments and an optional receiver.
///
/// Commands are assembled with the chained shortcut methods, each of which
/// consumes the command and returns the extended one:
///
/// ```
/// use slotmesh::{Action, Cmd};
///
/// let set = Cmd::new().c("SET").k("fooKey").a("will be set to this string");
/// assert_eq!(set.key(), Some(&b"fooKey"[..]));
///
/// let mut value = String::new();
/// let get = Cmd::new().c("GET").k("fooKey").r(&mut value);
/// # drop(get);
/// ```
///
/// Keys and arguments are kept in reusable buffers: after [`Cmd::reset`] the
/// next `k`/`a` calls overwrite the previous buffers instead of allocating.
/// Cloning a command yields a template with the same verb, keys and
/// arguments but without the receiver.
pub struct Cmd<'r> {
    verb: Vec<u8>,
    keys: Vec<Vec<u8>>,
    nkeys: usize,
    args: Vec<Vec<u8>>,
    nargs: usize,
    rcv: Option<&'r mut (dyn FromReply + Send)>,
}

impl<'r> Cmd<'r> {
    pub fn new() -> Self {
        Self {
            verb: Vec::new(),
            keys: Vec::new(),
            nkeys: 0,
            args: Vec::new(),
            nargs: 0,
            rcv: None,
        }
    }

    /// `PING`, the liveness probe.
    pub fn ping() -> Self {
        Self::new().c("PING")
    }

    /// `CLUSTER SLOTS`, decoded into `topology`.
    pub fn cluster_slots(topology: &'r mut Topology) -> Self {
        Self::new().c("CLUSTER").a("SLOTS").r(topology)
    }

    /// C (short for "Cmd") sets the command verb.
    pub fn c(mut self, verb: impl AsRef<[u8]>) -> Self {
        self.verb.clear();
        self.verb.extend_from_slice(verb.as_ref());
        self
    }

    /// K (short for "Key") appends a key.
    pub fn k(mut self, key: impl AsRef<[u8]>) -> Self {
        let buf = next_buf(&mut self.keys, &mut self.nkeys);
        buf.extend_from_slice(key.as_ref());
        self
    }

    /// A (short for "Arg") appends an argument.
    pub fn a(mut self, arg: impl ToArg) -> Self {
        let buf = next_buf(&mut self.args, &mut self.nargs);
        arg.write_arg(buf);
        self
    }

    /// R (short for "Rcv") sets the receiver the reply is decoded into. If no
    /// receiver is set the reply is discarded.
    pub fn r<'s, R>(self, rcv: &'s mut R) -> Cmd<'s>
    where
        R: FromReply + Send,
    {
        Cmd {
            verb: self.verb,
            keys: self.keys,
            nkeys: self.nkeys,
            args: self.args,
            nargs: self.nargs,
            rcv: Some(rcv),
        }
    }

    /// Clear the command so it can be reused as if it was just created. The
    /// backing buffers are kept.
    pub fn reset<'s>(mut self) -> Cmd<'s> {
        self.verb.clear();
        Cmd {
            verb: self.verb,
            keys: self.keys,
            nkeys: 0,
            args: self.args,
            nargs: 0,
            rcv: None,
        }
    }

    pub fn verb(&self) -> &[u8] {
        &self.verb
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.keys[..self.nkeys].iter().map(Vec::as_slice)
    }

    pub fn args(&self) -> impl Iterator<Item = &[u8]> {
        self.args[..self.nargs].iter().map(Vec::as_slice)
    }

    pub fn has_receiver(&self) -> bool {
        self.rcv.is_some()
    }

    fn parts(&self) -> Vec<&[u8]> {
        let mut parts = Vec::with_capacity(1 + self.nkeys + self.nargs);
        parts.push(self.verb.as_slice());
        parts.extend(self.keys());
        parts.extend(self.args());
        parts
    }
}

fn next_buf<'a>(bufs: &'a mut Vec<Vec<u8>>, len: &mut usize) -> &'a mut Vec<u8> {
    if *len == bufs.len() {
        bufs.push(Vec::new());
    }
    let buf = &mut bufs[*len];
    buf.clear();
    *len += 1;
    buf
}

impl Default for Cmd<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Cmd<'_> {
    fn clone(&self) -> Self {
        Self {
            verb: self.verb.clone(),
            keys: self.keys[..self.nkeys].to_vec(),
            nkeys: self.nkeys,
            args: self.args[..self.nargs].to_vec(),
            nargs: self.nargs,
            rcv: None,
        }
    }
}

impl fmt::Debug for Cmd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lossy = |b: &[u8]| String::from_utf8_lossy(b).into_owned();
        f.debug_struct("Cmd")
            .field("verb", &lossy(&self.verb))
            .field("keys", &self.keys().map(lossy).collect::<Vec<_>>())
            .field("args", &self.args().map(lossy).collect::<Vec<_>>())
            .field("has_receiver", &self.has_receiver())
            .finish()
    }
}

impl Action for Cmd<'_> {
    fn key(&self) -> Option<&[u8]> {
        self.keys().next()
    }

    /// Writes the command to `conn` and decodes the reply into the receiver
    /// (if set). Calls `close` on the conn if writing or reading fails. Error
    /// replies leave the stream intact, so the conn stays open for them.
    async fn run<C: Conn>(&mut self, conn: &mut C) -> Result<()> {
        if self.verb.is_empty() {
            return Err(ClusterError::Protocol("command verb is required".to_string()));
        }

        let written = {
            let parts = self.parts();
            conn.encode(&parts).await
        };
        if let Err(err) = written {
            conn.close().await;
            return Err(err);
        }

        let reply = match conn.decode().await {
            Ok(reply) => reply,
            Err(err) => {
                conn.close().await;
                return Err(err);
            }
        };

        if let RespValue::Error(msg) = &reply {
            return Err(ClusterError::from_reply(msg));
        }

        if let Some(rcv) = self.rcv.as_mut() {
            if let Err(err) = rcv.set_from_reply(reply) {
                conn.close().await;
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Values accepted as command arguments.
pub trait ToArg {
    fn write_arg(&self, out: &mut Vec<u8>);
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn write_arg(&self, out: &mut Vec<u8>) {
        (**self).write_arg(out)
    }
}

impl ToArg for str {
    fn write_arg(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl ToArg for String {
    fn write_arg(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl ToArg for [u8] {
    fn write_arg(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl ToArg for Vec<u8> {
    fn write_arg(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl ToArg for Bytes {
    fn write_arg(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

macro_rules! display_arg {
    ($($t:ty),*) => {
        $(
            impl ToArg for $t {
                fn write_arg(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(self.to_string().as_bytes());
                }
            }
        )*
    };
}

display_arg!(i32, i64, u16, u32, u64, usize, f64);
