use std::io;
use thiserror::Error;

/// Errors produced by the router, the command layer and the default pool.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// No seed address produced a pool, or the initial topology fetch failed.
    #[error("no reachable bootstrap address: {0}")]
    NoReachableBootstrap(String),

    /// The slot map could not be fetched from any live node.
    #[error("cluster topology query failed: {0}")]
    TopologyQueryFailed(String),

    /// Pool creation failed for a newly discovered node during a sync. The
    /// snapshot has already been replaced when this is returned.
    #[error("error connecting to {addr}: {reason}")]
    ReconciliationFailed { addr: String, reason: String },

    /// Every known node failed its liveness probe.
    #[error("no available known cluster nodes")]
    NoAvailableNodes,

    /// The snapshot names a node that has no pool.
    #[error("unexpected: no pool for address {addr:?}")]
    InconsistentRoutingState { addr: String },

    /// No range in the snapshot covers the slot.
    #[error("unexpected: no known address for slot {0}")]
    SlotNotOwned(u16),

    #[error("MOVED {slot} {addr}")]
    Moved { slot: u16, addr: String },

    #[error("ASK {slot} {addr}")]
    Ask { slot: u16, addr: String },

    /// Error reply returned by a node.
    #[error("server error: {0}")]
    Server(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("cluster client is closed")]
    Closed,
}

impl ClusterError {
    /// Converts an error reply into the matching error, recognising the
    /// MOVED and ASK redirections.
    pub fn from_reply(msg: &str) -> Self {
        let mut parts = msg.split_whitespace();
        let kind = parts.next().unwrap_or_default();
        if kind == "MOVED" || kind == "ASK" {
            let slot = parts.next().and_then(|s| s.parse::<u16>().ok());
            let addr = parts.next();
            if let (Some(slot), Some(addr)) = (slot, addr) {
                let addr = addr.to_string();
                return if kind == "MOVED" {
                    ClusterError::Moved { slot, addr }
                } else {
                    ClusterError::Ask { slot, addr }
                };
            }
        }
        ClusterError::Server(msg.to_string())
    }

    /// True for the redirections a caller may react to with a sync.
    pub fn is_redirect(&self) -> bool {
        matches!(self, ClusterError::Moved { .. } | ClusterError::Ask { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reply_moved() {
        match ClusterError::from_reply("MOVED 3999 127.0.0.1:7001") {
            ClusterError::Moved { slot, addr } => {
                assert_eq!(slot, 3999);
                assert_eq!(addr, "127.0.0.1:7001");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_from_reply_ask() {
        let err = ClusterError::from_reply("ASK 1234 10.0.0.5:6380");
        assert!(matches!(err, ClusterError::Ask { slot: 1234, .. }));
        assert!(err.is_redirect());
    }

    #[test]
    fn test_from_reply_plain_error() {
        let err = ClusterError::from_reply("ERR unknown command");
        assert!(matches!(err, ClusterError::Server(ref m) if m == "ERR unknown command"));
        assert!(!err.is_redirect());

        // Malformed redirections stay plain server errors
        assert!(matches!(
            ClusterError::from_reply("MOVED 123"),
            ClusterError::Server(_)
        ));
    }
}
