//! Commands as data.
//!
//! An [`Action`] describes one unit of work that can be inspected for its key
//! before it runs, which is what lets the cluster router pick a node without
//! knowing anything else about the operation. [`Cmd`] is the builder-style
//! implementation for single commands.

mod cmd;
mod reply;

pub use cmd::{Cmd, ToArg};
pub use reply::FromReply;

use crate::error::Result;
use crate::protocol::RespValue;
use std::future::Future;

/// A single connection an [`Action`] runs against.
///
/// Implementations are handed out by a pool for the duration of one
/// [`Action::run`] call.
pub trait Conn: Send {
    /// Write one command, given as its verb followed by its arguments.
    fn encode(&mut self, parts: &[&[u8]]) -> impl Future<Output = Result<()>> + Send;

    /// Read one reply.
    fn decode(&mut self) -> impl Future<Output = Result<RespValue>> + Send;

    /// Close the connection. A closed connection must not be reused.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// A unit of work routed by key.
pub trait Action: Send {
    /// The key the action operates on, `None` for keyless commands.
    fn key(&self) -> Option<&[u8]>;

    /// Execute against `conn`. On any I/O or decode failure the connection is
    /// closed before the error is returned.
    fn run<C: Conn>(&mut self, conn: &mut C) -> impl Future<Output = Result<()>> + Send;
}
