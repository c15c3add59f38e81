//! slotmesh - a slot-aware client router for Redis Cluster compatible stores.
//!
//! The crate keeps a cached view of which node owns which hash slot range,
//! maintains one connection pool per node and sends every command to the
//! node that owns the slot of its first key.
//!
//! ```no_run
//! use slotmesh::{Cluster, Cmd, TcpPoolFactory};
//!
//! # async fn demo() -> slotmesh::Result<()> {
//! let cluster = Cluster::new(TcpPoolFactory::default(), &["127.0.0.1:7000"]).await?;
//!
//! let mut value = String::new();
//! cluster.do_action(&mut Cmd::new().c("SET").k("user:1").a("alice")).await?;
//! cluster.do_action(&mut Cmd::new().c("GET").k("user:1").r(&mut value)).await?;
//!
//! cluster.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod cluster;
pub mod command;
pub mod config;
pub mod error;
pub mod protocol;

pub use client::{Client, PoolFactory, TcpConn, TcpPool, TcpPoolFactory};
pub use cluster::{key_slot, Cluster, PoolHandle, SlotRange, Topology, SLOT_COUNT};
pub use command::{Action, Cmd, Conn, FromReply, ToArg};
pub use config::ClusterConfig;
pub use error::{ClusterError, Result};
pub use protocol::RespValue;
