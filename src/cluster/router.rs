//! The cluster router.

use super::handle::PoolHandle;
use super::slot::key_slot;
use super::topology::Topology;
use crate::client::{Client, PoolFactory};
use crate::command::{Action, Cmd};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const NETWORK: &str = "tcp";

/// Pools and the topology they were reconciled against. Always read and
/// written together under one lock.
struct ClusterState<P> {
    pools: HashMap<String, Arc<P>>,
    topology: Topology,
    closed: bool,
}

impl<P> ClusterState<P> {
    fn route(&self, slot: u16) -> Result<(&str, Arc<P>)> {
        if self.closed {
            return Err(ClusterError::Closed);
        }
        let range = self
            .topology
            .range_for_slot(slot)
            .ok_or(ClusterError::SlotNotOwned(slot))?;
        let pool = self.pools.get(&range.addr).ok_or_else(|| {
            ClusterError::InconsistentRoutingState {
                addr: range.addr.clone(),
            }
        })?;
        Ok((range.addr.as_str(), Arc::clone(pool)))
    }
}

/// State shared between the router and its background refresher.
struct Shared<F: PoolFactory> {
    factory: F,
    state: RwLock<ClusterState<F::Pool>>,
}

impl<F: PoolFactory> Shared<F> {
    /// Probe the known pools in random order and return the first one that
    /// answers PING.
    async fn pick_pool(&self) -> Result<PoolHandle<F::Pool>> {
        let mut candidates: Vec<(String, Arc<F::Pool>)> = {
            let state = self.state.read().await;
            if state.closed {
                return Err(ClusterError::Closed);
            }
            state
                .pools
                .iter()
                .map(|(addr, pool)| (addr.clone(), Arc::clone(pool)))
                .collect()
        };
        candidates.shuffle(&mut rand::thread_rng());

        for (addr, pool) in candidates {
            let probe = pool.do_action(&mut Cmd::ping()).await;
            match probe {
                Ok(()) => return Ok(PoolHandle::Live { addr, pool }),
                Err(err) => {
                    debug!("Node {} failed liveness probe: {}", addr, err);
                }
            }
        }
        Ok(PoolHandle::Dead)
    }

    async fn topology(&self) -> Result<Topology> {
        let handle = self
            .pick_pool()
            .await
            .map_err(|e| ClusterError::TopologyQueryFailed(e.to_string()))?;

        let mut topology = Topology::default();
        handle
            .do_action(&mut Cmd::cluster_slots(&mut topology))
            .await
            .map_err(|e| match handle.addr() {
                Some(addr) => ClusterError::TopologyQueryFailed(format!("{}: {}", addr, e)),
                None => ClusterError::TopologyQueryFailed(e.to_string()),
            })?;
        Ok(topology)
    }

    async fn sync(&self) -> Result<()> {
        let topology = self.topology().await?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if state.closed {
            return Err(ClusterError::Closed);
        }

        if state.topology != topology {
            info!(
                "Cluster topology updated: {} slot ranges across {} nodes",
                topology.len(),
                topology.addrs().len()
            );
        }
        state.topology = topology;

        // Additions first, so an address that is both dropped and re-added
        // is never missing a pool.
        let wanted: Vec<String> = state.topology.addrs().into_iter().map(str::to_string).collect();
        for addr in wanted {
            if state.pools.contains_key(&addr) {
                continue;
            }
            match self.factory.connect(NETWORK, &addr).await {
                Ok(pool) => {
                    info!("Connected to cluster node {}", addr);
                    state.pools.insert(addr, Arc::new(pool));
                }
                Err(err) => {
                    return Err(ClusterError::ReconciliationFailed {
                        addr,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let stale: Vec<String> = {
            let current = state.topology.addrs();
            state
                .pools
                .keys()
                .filter(|addr| !current.contains(addr.as_str()))
                .cloned()
                .collect()
        };
        for addr in stale {
            if let Some(pool) = state.pools.remove(&addr) {
                info!("Removing cluster node {}", addr);
                if let Err(err) = pool.close().await {
                    warn!("Failed to close pool for {}: {}", addr, err);
                }
            }
        }

        Ok(())
    }

    async fn do_action<A: Action>(&self, action: &mut A) -> Result<()> {
        let Some(slot) = action.key().map(key_slot) else {
            return self.pick_pool().await?.do_action(action).await;
        };

        // The lock only covers the lookup, never the I/O.
        let pool = {
            let state = self.state.read().await;
            let (_, pool) = state.route(slot)?;
            pool
        };
        pool.do_action(action).await
    }

    /// Close and drop every pool and mark the state terminal.
    async fn close_pools(&self) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.topology = Topology::default();
        for (addr, pool) in state.pools.drain() {
            if let Err(err) = pool.close().await {
                warn!("Failed to close pool for {}: {}", addr, err);
            }
        }
    }
}

struct Refresher {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// A connection to a cluster: one pool per node plus the slot map used to
/// route commands between them.
///
/// All methods take `&self` and are safe to call concurrently. A background
/// task calls [`Cluster::sync`] every refresh interval (30 seconds unless
/// configured otherwise) until [`Cluster::close`].
pub struct Cluster<F: PoolFactory> {
    shared: Arc<Shared<F>>,
    refresher: Mutex<Option<Refresher>>,
    errors: Mutex<Option<mpsc::Receiver<ClusterError>>>,
}

impl<F: PoolFactory> Cluster<F> {
    /// Connect using the first usable address in `addrs`, discover the rest
    /// of the cluster with CLUSTER SLOTS and connect to every node found.
    pub async fn new<S: AsRef<str>>(factory: F, addrs: &[S]) -> Result<Self> {
        let addrs: Vec<String> = addrs.iter().map(|a| a.as_ref().to_string()).collect();
        Self::start(
            factory,
            &addrs,
            Duration::from_secs(crate::config::DEFAULT_REFRESH_INTERVAL_SECS),
        )
        .await
    }

    /// Like [`Cluster::new`], with seeds and refresh interval taken from a
    /// validated [`ClusterConfig`].
    pub async fn with_config(factory: F, config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        Self::start(factory, &config.bootstrap, config.refresh_interval()).await
    }

    async fn start(factory: F, addrs: &[String], refresh_interval: Duration) -> Result<Self> {
        let mut pools = HashMap::new();
        let mut last_err = None;
        for addr in addrs {
            match factory.connect(NETWORK, addr).await {
                Ok(pool) => {
                    info!("Bootstrapping cluster from {}", addr);
                    pools.insert(addr.clone(), Arc::new(pool));
                    break;
                }
                Err(err) => {
                    debug!("Bootstrap address {} is not usable: {}", addr, err);
                    last_err = Some(err);
                }
            }
        }
        if pools.is_empty() {
            return Err(ClusterError::NoReachableBootstrap(match last_err {
                Some(err) => err.to_string(),
                None => "no bootstrap addresses given".to_string(),
            }));
        }

        let shared = Arc::new(Shared {
            factory,
            state: RwLock::new(ClusterState {
                pools,
                topology: Topology::default(),
                closed: false,
            }),
        });

        if let Err(err) = shared.sync().await {
            shared.close_pools().await;
            return Err(ClusterError::NoReachableBootstrap(err.to_string()));
        }

        let (errors_tx, errors_rx) = mpsc::channel(1);
        let refresher = spawn_refresher(Arc::clone(&shared), refresh_interval, errors_tx);

        Ok(Self {
            shared,
            refresher: Mutex::new(Some(refresher)),
            errors: Mutex::new(Some(errors_rx)),
        })
    }

    /// Query any live node for the current slot map. Router state is left
    /// untouched.
    pub async fn topology(&self) -> Result<Topology> {
        self.shared.topology().await
    }

    /// Fetch the slot map and reconcile the pools with it: create pools for
    /// new nodes, close pools of nodes that left.
    ///
    /// If a new node cannot be reached the new slot map is kept anyway and
    /// [`ClusterError::ReconciliationFailed`] is returned.
    pub async fn sync(&self) -> Result<()> {
        self.shared.sync().await
    }

    /// A pool for any node that answers PING, or [`PoolHandle::Dead`].
    pub async fn any_pool(&self) -> PoolHandle<F::Pool> {
        self.shared.pick_pool().await.unwrap_or(PoolHandle::Dead)
    }

    /// Run `action` on the node owning the slot of its key, or on any live
    /// node if it has no key.
    ///
    /// Redirections are returned as [`ClusterError::Moved`] /
    /// [`ClusterError::Ask`] and are not followed.
    pub async fn do_action<A: Action>(&self, action: &mut A) -> Result<()> {
        self.shared.do_action(action).await
    }

    /// The address of the node currently owning `key`.
    pub async fn slot_owner(&self, key: impl AsRef<[u8]>) -> Result<String> {
        let slot = key_slot(key.as_ref());
        let state = self.shared.state.read().await;
        let (addr, _) = state.route(slot)?;
        Ok(addr.to_string())
    }

    /// The cached slot map as of the last successful sync.
    pub async fn snapshot(&self) -> Topology {
        self.shared.state.read().await.topology.clone()
    }

    /// Addresses of the nodes a pool is currently held for, sorted.
    pub async fn pool_addrs(&self) -> Vec<String> {
        let state = self.shared.state.read().await;
        let mut addrs: Vec<String> = state.pools.keys().cloned().collect();
        addrs.sort();
        addrs
    }

    /// Receiver for errors from background syncs. Only the first caller gets
    /// it. Notifications are dropped while one is still unread.
    pub fn take_errors(&self) -> Option<mpsc::Receiver<ClusterError>> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Stop the background refresher, wait for it to exit, and close every
    /// pool. The cluster is unusable afterwards.
    pub async fn close(&self) {
        let refresher = self
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(refresher) = refresher {
            let _ = refresher.shutdown.send(());
            if let Err(err) = refresher.handle.await {
                warn!("Topology refresher exited abnormally: {}", err);
            }
        }
        self.shared.close_pools().await;
    }
}

impl<F: PoolFactory> Client for Cluster<F> {
    async fn do_action<A: Action>(&self, action: &mut A) -> Result<()> {
        Cluster::do_action(self, action).await
    }

    async fn close(&self) -> Result<()> {
        Cluster::close(self).await;
        Ok(())
    }
}

impl<F: PoolFactory> Drop for Cluster<F> {
    fn drop(&mut self) {
        let refresher = self
            .refresher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(refresher) = refresher {
            let _ = refresher.shutdown.send(());
        }
    }
}

fn spawn_refresher<F: PoolFactory>(
    shared: Arc<Shared<F>>,
    period: Duration,
    errors: mpsc::Sender<ClusterError>,
) -> Refresher {
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    if let Err(err) = shared.sync().await {
                        warn!("Background topology sync failed: {}", err);
                        // A full channel drops the notification
                        let _ = errors.try_send(err);
                    }
                }
            }
        }
        debug!("Topology refresher stopped");
    });

    Refresher { shutdown, handle }
}
