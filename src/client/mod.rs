//! Client-side seams: pooled connections and the factory that creates them.
//!
//! The cluster router only talks to nodes through these two traits. A TCP
//! implementation is provided in [`TcpPoolFactory`]; tests and embedders can
//! supply their own.

mod connection;
mod pool;

pub use connection::TcpConn;
pub use pool::{TcpPool, TcpPoolFactory};

use crate::command::Action;
use crate::error::Result;
use std::future::Future;

/// Anything that can run an [`Action`]: a pool of connections to one node, or
/// the cluster router itself.
pub trait Client: Send + Sync + 'static {
    /// Obtain a connection, run `action` against it and give it back.
    fn do_action<A: Action>(&self, action: &mut A) -> impl Future<Output = Result<()>> + Send;

    /// Release every connection held by this client.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Creates the pool for one node address.
///
/// Called once per newly discovered node and possibly concurrently, so
/// implementations must not keep per-call state.
pub trait PoolFactory: Send + Sync + 'static {
    type Pool: Client;

    /// `network` is always `"tcp"` when called by the router.
    fn connect(&self, network: &str, addr: &str)
        -> impl Future<Output = Result<Self::Pool>> + Send;
}
