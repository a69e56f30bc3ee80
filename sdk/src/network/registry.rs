//! # Endpoint Registry
//!
//! The client's routing table: which account owns each consensus node, and
//! where that node answers. This is the only shared mutable state in the
//! SDK, and it is read far more often than it is written, so the design is
//! copy-on-write:
//!
//! - The current [`RoutingTable`] lives behind `RwLock<Arc<RoutingTable>>`.
//!   Readers clone the `Arc` (cheap) and keep iterating their snapshot even
//!   if a refresh lands mid-flight. Writers build a complete replacement
//!   table and swap the `Arc` — no reader ever observes a half-updated map.
//! - Node health is a `DashMap` side table of cooldown deadlines. A node
//!   that just failed is deprioritized until its cooldown expires, never
//!   permanently excluded; the network may recover.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::entity::{AccountId, NodeId};
use crate::error::SdkError;
use crate::network::endpoint::{Endpoint, NodeRecord, ParseEndpointError};

// ---------------------------------------------------------------------------
// RoutingTable
// ---------------------------------------------------------------------------

/// An immutable node-identity → record mapping.
///
/// Published as a whole via [`EndpointRegistry::replace`]; never mutated
/// after publication.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingTable {
    nodes: HashMap<NodeId, NodeRecord>,
}

impl RoutingTable {
    /// Builds a table from node records. Later records win on node-id
    /// collision.
    pub fn from_records(records: impl IntoIterator<Item = NodeRecord>) -> Self {
        Self {
            nodes: records.into_iter().map(|r| (r.node_id, r)).collect(),
        }
    }

    /// Builds a table from an `"host:port" -> account` map, the shape used
    /// by operator overrides and bootstrap config. Node ids are assigned in
    /// address order, so the same map always yields the same table.
    pub fn from_address_map(
        map: &HashMap<String, AccountId>,
    ) -> Result<Self, ParseEndpointError> {
        let mut entries: Vec<(&String, &AccountId)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut records = Vec::with_capacity(entries.len());
        for (idx, (addr, account)) in entries.into_iter().enumerate() {
            let endpoint = Endpoint::from_str(addr)?;
            records.push(NodeRecord::new(
                NodeId(idx as u64),
                account.clone(),
                endpoint,
            ));
        }
        Ok(Self::from_records(records))
    }

    /// Looks up a node record.
    pub fn get(&self, node_id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&node_id)
    }

    /// The record whose owning account is `account`, if any.
    pub fn node_owning_account(&self, account: &AccountId) -> Option<&NodeRecord> {
        self.nodes.values().find(|r| &r.account_id == account)
    }

    /// Iterates all records in unspecified order.
    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    /// The `"host:port" -> account` view exposed to callers.
    pub fn address_book(&self) -> HashMap<String, AccountId> {
        self.nodes
            .values()
            .flat_map(|r| {
                r.endpoints
                    .iter()
                    .map(|ep| (ep.to_string(), r.account_id.clone()))
            })
            .collect()
    }

    /// Number of nodes in the table.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the table has no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EndpointRegistry
// ---------------------------------------------------------------------------

/// Shared, copy-on-write view of the network topology plus node health.
///
/// One instance per client session, shared by reference count between the
/// submission coordinator, the topology refresher, and the receipt poller.
/// There are no hidden globals.
pub struct EndpointRegistry {
    table: RwLock<Arc<RoutingTable>>,
    cooldowns: DashMap<NodeId, Instant>,
}

impl EndpointRegistry {
    /// Creates a registry seeded with `table`.
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
            cooldowns: DashMap::new(),
        }
    }

    /// The current snapshot. Holders keep reading a consistent table even
    /// while a refresh swaps in a new one.
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.table.read())
    }

    /// Atomically replaces the routing table. Returns `true` when the new
    /// table differs from the old one.
    ///
    /// Writers are mutually exclusive (the write lock), and readers observe
    /// either the old or the new table, never a mix.
    pub fn replace(&self, table: RoutingTable) -> bool {
        let table = Arc::new(table);
        let mut guard = self.table.write();
        let changed = **guard != *table;
        if changed {
            debug!(nodes = table.len(), "routing table replaced");
        }
        *guard = table;
        changed
    }

    /// Looks up one node, failing with [`SdkError::UnknownNode`] on a miss.
    /// Callers treat that miss as a routing failure and trigger a refresh.
    pub fn get(&self, node_id: NodeId) -> Result<NodeRecord, SdkError> {
        self.snapshot()
            .get(node_id)
            .cloned()
            .ok_or(SdkError::UnknownNode(node_id))
    }

    /// Records that `node_id` just failed; it is deprioritized until the
    /// cooldown expires.
    pub fn mark_unhealthy(&self, node_id: NodeId, cooldown: Duration) {
        debug!(node = %node_id, cooldown_ms = cooldown.as_millis() as u64, "node marked unhealthy");
        self.cooldowns.insert(node_id, Instant::now() + cooldown);
    }

    /// `true` unless the node is inside a failure cooldown window.
    pub fn is_healthy(&self, node_id: NodeId) -> bool {
        match self.cooldowns.get(&node_id) {
            Some(until) => Instant::now() >= *until,
            None => true,
        }
    }

    /// Picks a submission target.
    ///
    /// Preference order: healthy and not yet tried, then healthy, then
    /// anything — a node in cooldown may still be chosen when it is all we
    /// have. Selection within a tier is uniformly random so concurrent
    /// clients spread load. Returns `None` only for an empty table.
    pub fn select_node(&self, exclude: &HashSet<NodeId>) -> Option<NodeRecord> {
        let snapshot = self.snapshot();
        let all: Vec<&NodeRecord> = snapshot.records().collect();
        if all.is_empty() {
            return None;
        }

        let healthy_untried: Vec<&&NodeRecord> = all
            .iter()
            .filter(|r| self.is_healthy(r.node_id) && !exclude.contains(&r.node_id))
            .collect();
        let healthy: Vec<&&NodeRecord> = all.iter().filter(|r| self.is_healthy(r.node_id)).collect();

        let mut rng = rand::thread_rng();
        let chosen = if !healthy_untried.is_empty() {
            **healthy_untried.choose(&mut rng).unwrap()
        } else if !healthy.is_empty() {
            **healthy.choose(&mut rng).unwrap()
        } else {
            *all.choose(&mut rng).unwrap()
        };
        Some(chosen.clone())
    }

    /// The caller-facing `"host:port" -> account` view of the current table.
    pub fn address_book(&self) -> HashMap<String, AccountId> {
        self.snapshot().address_book()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node: u64, account: u64) -> NodeRecord {
        NodeRecord::new(
            NodeId(node),
            AccountId::from_num(account),
            Endpoint::ipv4([10, 0, 0, node as u8], 50211),
        )
    }

    fn registry(pairs: &[(u64, u64)]) -> EndpointRegistry {
        EndpointRegistry::new(RoutingTable::from_records(
            pairs.iter().map(|&(n, a)| record(n, a)),
        ))
    }

    #[test]
    fn get_known_and_unknown_node() {
        let reg = registry(&[(0, 3), (1, 4)]);
        assert_eq!(reg.get(NodeId(0)).unwrap().account_id, AccountId::from_num(3));
        assert!(matches!(
            reg.get(NodeId(9)),
            Err(SdkError::UnknownNode(NodeId(9)))
        ));
    }

    #[test]
    fn replace_reports_change() {
        let reg = registry(&[(0, 3)]);
        let same = RoutingTable::from_records([record(0, 3)]);
        assert!(!reg.replace(same));

        let different = RoutingTable::from_records([record(0, 4)]);
        assert!(reg.replace(different));
        assert_eq!(reg.get(NodeId(0)).unwrap().account_id, AccountId::from_num(4));
    }

    #[test]
    fn snapshot_survives_replace() {
        let reg = registry(&[(0, 3)]);
        let old = reg.snapshot();
        reg.replace(RoutingTable::from_records([record(0, 4)]));

        // The old snapshot still answers with the old mapping.
        assert_eq!(old.get(NodeId(0)).unwrap().account_id, AccountId::from_num(3));
        // A fresh read sees the new one.
        assert_eq!(reg.get(NodeId(0)).unwrap().account_id, AccountId::from_num(4));
    }

    #[test]
    fn cooldown_deprioritizes_then_readmits() {
        let reg = registry(&[(0, 3), (1, 4)]);
        assert!(reg.is_healthy(NodeId(0)));

        reg.mark_unhealthy(NodeId(0), Duration::from_secs(60));
        assert!(!reg.is_healthy(NodeId(0)));

        // Selection avoids the cooling node while an alternative exists.
        for _ in 0..50 {
            let picked = reg.select_node(&HashSet::new()).unwrap();
            assert_eq!(picked.node_id, NodeId(1));
        }

        // An already-elapsed cooldown readmits immediately.
        reg.mark_unhealthy(NodeId(0), Duration::from_secs(0));
        assert!(reg.is_healthy(NodeId(0)));
    }

    #[test]
    fn selection_excludes_tried_nodes_when_alternatives_exist() {
        let reg = registry(&[(0, 3), (1, 4)]);
        let tried: HashSet<NodeId> = [NodeId(0)].into();
        for _ in 0..50 {
            assert_eq!(reg.select_node(&tried).unwrap().node_id, NodeId(1));
        }
    }

    #[test]
    fn selection_falls_back_when_everything_is_tried_or_cooling() {
        let reg = registry(&[(0, 3)]);
        reg.mark_unhealthy(NodeId(0), Duration::from_secs(60));
        let tried: HashSet<NodeId> = [NodeId(0)].into();
        // Last resort: the only node we have, cooling or not.
        assert_eq!(reg.select_node(&tried).unwrap().node_id, NodeId(0));
    }

    #[test]
    fn select_on_empty_table_is_none() {
        let reg = EndpointRegistry::new(RoutingTable::default());
        assert!(reg.select_node(&HashSet::new()).is_none());
    }

    #[test]
    fn address_map_table_is_deterministic() {
        let mut map = HashMap::new();
        map.insert("10.0.0.1:50211".to_string(), AccountId::from_num(3));
        map.insert("10.0.0.2:50211".to_string(), AccountId::from_num(4));

        let a = RoutingTable::from_address_map(&map).unwrap();
        let b = RoutingTable::from_address_map(&map).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.address_book(), map);
    }

    /// A reader during a `replace` observes either the fully
    /// old or fully new mapping, never a mix. Each published table maps all
    /// nodes to one "generation" account, so a mixed view would show two
    /// different accounts in a single snapshot.
    #[test]
    fn concurrent_readers_never_see_a_torn_table() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let reg = Arc::new(registry(&[(0, 100), (1, 100), (2, 100)]));
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let reg = Arc::clone(&reg);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut gen = 100u64;
                while !stop.load(Ordering::Relaxed) {
                    gen = if gen == 100 { 200 } else { 100 };
                    reg.replace(RoutingTable::from_records(
                        (0..3).map(|n| record(n, gen)),
                    ));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let snap = reg.snapshot();
                        let accounts: HashSet<AccountId> =
                            snap.records().map(|r| r.account_id.clone()).collect();
                        assert_eq!(
                            accounts.len(),
                            1,
                            "snapshot mixed two table generations: {accounts:?}"
                        );
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(200));
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
