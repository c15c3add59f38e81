use crate::client::Client;
use crate::command::Action;
use crate::error::{ClusterError, Result};
use std::sync::Arc;

/// A pool picked by [`Cluster::any_pool`](super::Cluster::any_pool).
///
/// `Dead` stands in when no node answered the liveness probe; every action
/// run through it fails with [`ClusterError::NoAvailableNodes`], so callers
/// can use the handle without checking first.
pub enum PoolHandle<P> {
    Live { addr: String, pool: Arc<P> },
    Dead,
}

impl<P> PoolHandle<P> {
    /// Address of the live node, `None` for `Dead`.
    pub fn addr(&self) -> Option<&str> {
        match self {
            PoolHandle::Live { addr, .. } => Some(addr),
            PoolHandle::Dead => None,
        }
    }

    /// Check if no node answered the probe
    pub fn is_dead(&self) -> bool {
        matches!(self, PoolHandle::Dead)
    }
}

impl<P> Clone for PoolHandle<P> {
    fn clone(&self) -> Self {
        match self {
            PoolHandle::Live { addr, pool } => PoolHandle::Live {
                addr: addr.clone(),
                pool: Arc::clone(pool),
            },
            PoolHandle::Dead => PoolHandle::Dead,
        }
    }
}

impl<P> std::fmt::Debug for PoolHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolHandle::Live { addr, .. } => f.debug_tuple("Live").field(addr).finish(),
            PoolHandle::Dead => f.write_str("Dead"),
        }
    }
}

impl<P: Client> Client for PoolHandle<P> {
    async fn do_action<A: Action>(&self, action: &mut A) -> Result<()> {
        match self {
            PoolHandle::Live { pool, .. } => pool.do_action(action).await,
            PoolHandle::Dead => Err(ClusterError::NoAvailableNodes),
        }
    }

    /// The pool stays owned by the router; closing a handle does nothing.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
