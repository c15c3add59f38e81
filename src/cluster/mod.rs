//! Cluster module: slot-aware routing across the nodes of a Redis Cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │      Caller: Cmd / any Action               │
//! └─────────────────────────────────────────────┘
//!                      │ key ──► slot (CRC16)
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │      Cluster router                         │
//! │  (Topology snapshot + one pool per node,    │
//! │   background CLUSTER SLOTS refresh)         │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │      PoolFactory / Client                   │
//! │  (TcpPool by default)                       │
//! └─────────────────────────────────────────────┘
//! ```

mod handle;
mod router;
mod slot;
mod topology;

pub use handle::PoolHandle;
pub use router::Cluster;
pub use slot::{crc16, hash_tag, key_slot, SLOT_COUNT};
pub use topology::{SlotRange, Topology};
