use super::{Client, PoolFactory, TcpConn};
use crate::command::{Action, Conn};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// A small pool of idle [`TcpConn`]s to a single node.
///
/// Connections are dialed on demand when the pool is empty and returned
/// after use unless the action closed them. At most `size` idle connections
/// are kept.
pub struct TcpPool {
    addr: String,
    size: usize,
    connect_timeout: Duration,
    idle: Mutex<Vec<TcpConn>>,
    closed: AtomicBool,
}

impl TcpPool {
    /// Create the pool, dialing one connection up front so that an
    /// unreachable node fails here rather than on first use.
    pub async fn connect(addr: &str, size: usize, connect_timeout: Duration) -> Result<Self> {
        let conn = TcpConn::connect(addr, connect_timeout).await?;
        debug!("Created pool for {} (size {})", addr, size);
        Ok(Self {
            addr: addr.to_string(),
            size: size.max(1),
            connect_timeout,
            idle: Mutex::new(vec![conn]),
            closed: AtomicBool::new(false),
        })
    }

    /// Node address this pool connects to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of connections currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn get(&self) -> Result<TcpConn> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClusterError::Closed);
        }
        let pooled = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            idle.pop()
        };
        match pooled {
            Some(conn) => Ok(conn),
            None => TcpConn::connect(&self.addr, self.connect_timeout).await,
        }
    }

    fn put(&self, conn: TcpConn) {
        if conn.is_closed() || self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.size {
            idle.push(conn);
        }
    }
}

impl Client for TcpPool {
    async fn do_action<A: Action>(&self, action: &mut A) -> Result<()> {
        let mut conn = self.get().await?;
        let result = action.run(&mut conn).await;
        self.put(conn);
        result
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let conns = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *idle)
        };
        for mut conn in conns {
            conn.close().await;
        }
        debug!("Closed pool for {}", self.addr);
        Ok(())
    }
}

/// Creates a [`TcpPool`] per node.
#[derive(Debug, Clone)]
pub struct TcpPoolFactory {
    pub pool_size: usize,
    pub connect_timeout: Duration,
}

impl TcpPoolFactory {
    /// Create a factory for pools of `pool_size` idle connections.
    pub fn new(pool_size: usize, connect_timeout: Duration) -> Self {
        Self {
            pool_size,
            connect_timeout,
        }
    }

    /// Take pool size and connect timeout from the config.
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(config.pool_size, config.connect_timeout())
    }
}

impl Default for TcpPoolFactory {
    fn default() -> Self {
        Self::from_config(&ClusterConfig::default())
    }
}

impl PoolFactory for TcpPoolFactory {
    type Pool = TcpPool;

    async fn connect(&self, network: &str, addr: &str) -> Result<TcpPool> {
        if network != "tcp" {
            return Err(ClusterError::UnsupportedNetwork(network.to_string()));
        }
        TcpPool::connect(addr, self.pool_size, self.connect_timeout).await
    }
}
