//! In-memory cluster used by the router tests.
//!
//! `MockCluster` plays the server side: it answers CLUSTER SLOTS with a
//! scripted slot map, answers GET with the address of the node that served
//! it, and can mark nodes down or unreachable. Every pool created and closed
//! is counted per address.

#![allow(dead_code)]

use slotmesh::{
    key_slot, Action, Client, ClusterError, Conn, PoolFactory, RespValue, Result,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    pub pools_created: usize,
    pub closes: usize,
    pub pings: usize,
    pub commands: Vec<String>,
}

#[derive(Default)]
struct Inner {
    slots: Vec<(u16, u16, String)>,
    down: HashSet<String>,
    unreachable: HashSet<String>,
    fail_cluster_slots: bool,
    redirects: HashMap<String, String>,
    connect_delay: Option<Duration>,
    slots_queries: usize,
    stats: HashMap<String, NodeStats>,
}

#[derive(Default)]
pub struct MockCluster {
    inner: Mutex<Inner>,
}

impl MockCluster {
    pub fn new(slots: &[(u16, u16, &str)]) -> Arc<Self> {
        let cluster = Arc::new(Self::default());
        cluster.set_slots(slots);
        cluster
    }

    pub fn factory(self: &Arc<Self>) -> MockFactory {
        MockFactory {
            cluster: Arc::clone(self),
        }
    }

    /// Replace the slot map. Ranges are half-open.
    pub fn set_slots(&self, slots: &[(u16, u16, &str)]) {
        self.inner.lock().unwrap().slots = slots
            .iter()
            .map(|(start, end, addr)| (*start, *end, addr.to_string()))
            .collect();
    }

    /// A down node accepts pools but fails every command.
    pub fn set_down(&self, addr: &str, down: bool) {
        let mut inner = self.inner.lock().unwrap();
        if down {
            inner.down.insert(addr.to_string());
        } else {
            inner.down.remove(addr);
        }
    }

    /// An unreachable node cannot have a pool created for it.
    pub fn set_unreachable(&self, addr: &str, unreachable: bool) {
        let mut inner = self.inner.lock().unwrap();
        if unreachable {
            inner.unreachable.insert(addr.to_string());
        } else {
            inner.unreachable.remove(addr);
        }
    }

    /// Answer every data command on `addr` with the given error reply.
    pub fn set_redirect(&self, addr: &str, reply: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        match reply {
            Some(reply) => {
                inner.redirects.insert(addr.to_string(), reply.to_string());
            }
            None => {
                inner.redirects.remove(addr);
            }
        }
    }

    /// Make every pool creation take `delay`.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.inner.lock().unwrap().connect_delay = delay;
    }

    pub fn fail_cluster_slots(&self, fail: bool) {
        self.inner.lock().unwrap().fail_cluster_slots = fail;
    }

    pub fn slots_queries(&self) -> usize {
        self.inner.lock().unwrap().slots_queries
    }

    pub fn stats(&self, addr: &str) -> NodeStats {
        self.inner
            .lock()
            .unwrap()
            .stats
            .get(addr)
            .cloned()
            .unwrap_or_default()
    }

    fn slots_reply(&self) -> RespValue {
        let inner = self.inner.lock().unwrap();
        let entries = inner
            .slots
            .iter()
            .map(|(start, end, addr)| {
                let (host, port) = addr.rsplit_once(':').unwrap();
                RespValue::array(vec![
                    RespValue::integer(*start as i64),
                    RespValue::integer(*end as i64 - 1),
                    RespValue::array(vec![
                        RespValue::bulk_string(host.to_string()),
                        RespValue::integer(port.parse().unwrap()),
                        RespValue::bulk_string(format!("id-{}", addr)),
                    ]),
                ])
            })
            .collect();
        RespValue::array(entries)
    }

    fn execute(&self, addr: &str, parts: &[Vec<u8>]) -> Result<RespValue> {
        let verb = String::from_utf8_lossy(&parts[0]).to_uppercase();
        let mut inner = self.inner.lock().unwrap();
        if inner.down.contains(addr) {
            return Err(ClusterError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("{} is down", addr),
            )));
        }

        match verb.as_str() {
            "PING" => {
                inner.stats.entry(addr.to_string()).or_default().pings += 1;
                Ok(RespValue::simple_string("PONG"))
            }
            "CLUSTER" => {
                inner.slots_queries += 1;
                if inner.fail_cluster_slots {
                    return Ok(RespValue::error("ERR This instance has cluster support disabled"));
                }
                drop(inner);
                Ok(self.slots_reply())
            }
            _ if inner.redirects.contains_key(addr) => {
                Ok(RespValue::error(inner.redirects[addr].clone()))
            }
            _ => {
                let stats = inner.stats.entry(addr.to_string()).or_default();
                let key = parts
                    .get(1)
                    .map(|k| String::from_utf8_lossy(k).into_owned())
                    .unwrap_or_default();
                stats.commands.push(format!("{} {}", verb, key).trim_end().to_string());
                if verb == "GET" {
                    Ok(RespValue::bulk_string(addr.to_string()))
                } else {
                    Ok(RespValue::ok())
                }
            }
        }
    }
}

pub struct MockFactory {
    cluster: Arc<MockCluster>,
}

impl PoolFactory for MockFactory {
    type Pool = MockPool;

    async fn connect(&self, network: &str, addr: &str) -> Result<MockPool> {
        assert_eq!(network, "tcp");
        let delay = self.cluster.inner.lock().unwrap().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.cluster.inner.lock().unwrap();
        if inner.unreachable.contains(addr) {
            return Err(ClusterError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} refused connection", addr),
            )));
        }
        inner.stats.entry(addr.to_string()).or_default().pools_created += 1;
        Ok(MockPool {
            addr: addr.to_string(),
            cluster: Arc::clone(&self.cluster),
        })
    }
}

pub struct MockPool {
    addr: String,
    cluster: Arc<MockCluster>,
}

impl Client for MockPool {
    async fn do_action<A: Action>(&self, action: &mut A) -> Result<()> {
        let mut conn = MockConn {
            addr: self.addr.clone(),
            cluster: Arc::clone(&self.cluster),
            pending: None,
            closed: false,
        };
        action.run(&mut conn).await
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.cluster.inner.lock().unwrap();
        inner.stats.entry(self.addr.clone()).or_default().closes += 1;
        Ok(())
    }
}

struct MockConn {
    addr: String,
    cluster: Arc<MockCluster>,
    pending: Option<Vec<Vec<u8>>>,
    closed: bool,
}

impl Conn for MockConn {
    async fn encode(&mut self, parts: &[&[u8]]) -> Result<()> {
        self.pending = Some(parts.iter().map(|p| p.to_vec()).collect());
        Ok(())
    }

    async fn decode(&mut self) -> Result<RespValue> {
        let parts = self
            .pending
            .take()
            .ok_or_else(|| ClusterError::Protocol("decode without encode".to_string()))?;
        self.cluster.execute(&self.addr, &parts)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// A key hashing to exactly `slot`.
pub fn key_for_slot(slot: u16) -> String {
    (0u64..)
        .map(|i| format!("key:{}", i))
        .find(|k| key_slot(k.as_bytes()) == slot)
        .unwrap()
}
