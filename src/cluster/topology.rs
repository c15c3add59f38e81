//! Cluster topology snapshot.

use crate::command::FromReply;
use crate::error::{ClusterError, Result};
use crate::protocol::RespValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A slot range and the primary node that owns it.
///
/// `end` is exclusive, so a node owning slots 0 through 8191 is recorded as
/// `start: 0, end: 8192`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    /// Node address (host:port)
    pub addr: String,
    pub start: u16,
    pub end: u16,
    /// Node ID, when the server reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SlotRange {
    /// Create a range without a node ID.
    pub fn new(addr: impl Into<String>, start: u16, end: u16) -> Self {
        Self {
            addr: addr.into(),
            start,
            end,
            id: None,
        }
    }

    /// Check if the slot falls in `[start, end)`
    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot < self.end
    }

    /// Number of slots in the range
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Slot ranges in the order the server reported them.
///
/// Ranges are expected not to overlap; that is the server's guarantee and is
/// not checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology(Vec<SlotRange>);

impl Topology {
    /// Wrap ranges, keeping their order.
    pub fn new(ranges: Vec<SlotRange>) -> Self {
        Self(ranges)
    }

    /// All ranges in reported order
    pub fn ranges(&self) -> &[SlotRange] {
        &self.0
    }

    /// Iterate over the ranges
    pub fn iter(&self) -> impl Iterator<Item = &SlotRange> {
        self.0.iter()
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the ranges by node address. A node owning several ranges maps
    /// to the last one.
    pub fn map(&self) -> HashMap<&str, &SlotRange> {
        self.0.iter().map(|r| (r.addr.as_str(), r)).collect()
    }

    /// Distinct node addresses.
    pub fn addrs(&self) -> BTreeSet<&str> {
        self.0.iter().map(|r| r.addr.as_str()).collect()
    }

    /// The first range containing `slot`.
    pub fn range_for_slot(&self, slot: u16) -> Option<&SlotRange> {
        self.0.iter().find(|r| r.contains(slot))
    }

    /// Number of slots covered, counting overlaps twice.
    pub fn slots_covered(&self) -> usize {
        self.0.iter().map(SlotRange::len).sum()
    }

    /// Parse a CLUSTER SLOTS reply.
    ///
    /// Each entry has the form `[start, end, [host, port, id, ...], replica...]`
    /// where `end` is inclusive. Replicas are ignored.
    pub fn from_cluster_slots(reply: &RespValue) -> Result<Self> {
        let entries = reply
            .as_array()
            .ok_or_else(|| parse_error(format!("expected array, got {}", reply.kind())))?;

        let mut ranges = Vec::with_capacity(entries.len());
        for entry in entries {
            let fields = entry
                .as_array()
                .ok_or_else(|| parse_error(format!("expected slot entry, got {}", entry.kind())))?;
            if fields.len() < 3 {
                return Err(parse_error(format!(
                    "slot entry has {} fields, expected at least 3",
                    fields.len()
                )));
            }

            let start = slot_field(&fields[0])?;
            let last = slot_field(&fields[1])?;
            if last < start {
                return Err(parse_error(format!("inverted slot range {}-{}", start, last)));
            }

            let node = fields[2]
                .as_array()
                .ok_or_else(|| parse_error("node entry is not an array".to_string()))?;
            if node.len() < 2 {
                return Err(parse_error("node entry is missing host or port".to_string()));
            }
            let host = node[0]
                .as_str()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| parse_error("node host is missing".to_string()))?;
            let port = node[1]
                .as_i64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| parse_error("node port is invalid".to_string()))?;
            let id = node.get(2).and_then(|v| v.as_str()).map(str::to_string);

            ranges.push(SlotRange {
                addr: format_addr(host, port),
                start,
                end: last + 1,
                id,
            });
        }

        Ok(Self(ranges))
    }
}

impl FromIterator<SlotRange> for Topology {
    fn from_iter<I: IntoIterator<Item = SlotRange>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Topology {
    type Item = &'a SlotRange;
    type IntoIter = std::slice::Iter<'a, SlotRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromReply for Topology {
    fn set_from_reply(&mut self, reply: RespValue) -> Result<()> {
        *self = Topology::from_cluster_slots(&reply)?;
        Ok(())
    }
}

fn slot_field(value: &RespValue) -> Result<u16> {
    value
        .as_i64()
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| *s < super::SLOT_COUNT)
        .ok_or_else(|| parse_error(format!("invalid slot {:?}", value)))
}

/// Canonical host:port form, bracketing IPv6 hosts.
fn format_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn parse_error(msg: String) -> ClusterError {
    ClusterError::Protocol(format!("failed to parse CLUSTER SLOTS response: {}", msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str, port: i64, id: &str) -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string(host.to_string()),
            RespValue::integer(port),
            RespValue::bulk_string(id.to_string()),
        ])
    }

    fn entry(start: i64, end: i64, nodes: Vec<RespValue>) -> RespValue {
        let mut fields = vec![RespValue::integer(start), RespValue::integer(end)];
        fields.extend(nodes);
        RespValue::array(fields)
    }

    #[test]
    fn test_parse_cluster_slots() {
        let reply = RespValue::array(vec![
            entry(
                0,
                8191,
                vec![node("10.0.0.1", 6379, "a1"), node("10.0.0.4", 6379, "r1")],
            ),
            entry(8192, 16383, vec![node("10.0.0.2", 6379, "a2")]),
        ]);

        let topology = Topology::from_cluster_slots(&reply).unwrap();
        assert_eq!(topology.len(), 2);
        assert_eq!(
            topology.ranges()[0],
            SlotRange {
                addr: "10.0.0.1:6379".to_string(),
                start: 0,
                end: 8192,
                id: Some("a1".to_string()),
            }
        );
        assert_eq!(topology.ranges()[1].end, 16384);
        assert_eq!(topology.slots_covered(), 16384);

        // Replicas are not part of the snapshot
        assert!(!topology.map().contains_key("10.0.0.4:6379"));
    }

    #[test]
    fn test_range_lookup() {
        let topology = Topology::new(vec![
            SlotRange::new("10.0.0.1:6379", 0, 8192),
            SlotRange::new("10.0.0.2:6379", 8192, 16384),
        ]);

        assert_eq!(topology.range_for_slot(100).unwrap().addr, "10.0.0.1:6379");
        assert_eq!(topology.range_for_slot(8191).unwrap().addr, "10.0.0.1:6379");
        assert_eq!(topology.range_for_slot(8192).unwrap().addr, "10.0.0.2:6379");
        assert_eq!(topology.range_for_slot(9000).unwrap().addr, "10.0.0.2:6379");
    }

    #[test]
    fn test_gaps_are_unowned() {
        let topology = Topology::new(vec![SlotRange::new("10.0.0.1:6379", 0, 100)]);
        assert!(topology.range_for_slot(100).is_none());
        assert!(Topology::default().range_for_slot(0).is_none());
    }

    #[test]
    fn test_addrs_deduplicates() {
        let topology = Topology::new(vec![
            SlotRange::new("10.0.0.1:6379", 0, 10),
            SlotRange::new("10.0.0.2:6379", 10, 20),
            SlotRange::new("10.0.0.1:6379", 20, 30),
        ]);
        let addrs: Vec<_> = topology.addrs().into_iter().collect();
        assert_eq!(addrs, vec!["10.0.0.1:6379", "10.0.0.2:6379"]);
        assert_eq!(topology.map().len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed_replies() {
        assert!(Topology::from_cluster_slots(&RespValue::ok()).is_err());

        let short = RespValue::array(vec![RespValue::array(vec![RespValue::integer(0)])]);
        assert!(Topology::from_cluster_slots(&short).is_err());

        let bad_slot = RespValue::array(vec![entry(0, 20000, vec![node("h", 1, "x")])]);
        assert!(Topology::from_cluster_slots(&bad_slot).is_err());

        let bad_port = RespValue::array(vec![entry(0, 10, vec![node("h", 70000, "x")])]);
        assert!(Topology::from_cluster_slots(&bad_port).is_err());
    }

    #[test]
    fn test_ipv6_address_format() {
        let reply = RespValue::array(vec![entry(0, 16383, vec![node("::1", 7000, "x")])]);
        let topology = Topology::from_cluster_slots(&reply).unwrap();
        assert_eq!(topology.ranges()[0].addr, "[::1]:7000");
    }

    #[test]
    fn test_json_round_trip_shape() {
        let topology = Topology::new(vec![SlotRange::new("10.0.0.1:6379", 0, 16384)]);
        let json = serde_json::to_string(&topology).unwrap();
        assert_eq!(json, r#"[{"addr":"10.0.0.1:6379","start":0,"end":16384}]"#);
    }
}
