//! # Topology Refresher
//!
//! Reconciles the client's routing table against an authoritative source —
//! typically a mirror/query service that knows the network's current
//! node-account-to-endpoint assignments. The refresher owns no transport and
//! no schedule of its own; it exposes one coalesced `refresh()` operation
//! and an optional periodic task, and everything else (startup refresh,
//! refresh-on-routing-failure) is driven by its callers.
//!
//! ## Coalescing
//!
//! N tasks hitting a routing failure at the same moment must not issue N
//! mirror lookups. `refresh()` single-flights: the first caller performs the
//! lookup while holding an async mutex; callers that queued up behind it
//! observe the bumped generation when they acquire the lock and return the
//! cached result instead of querying again.
//!
//! ## Soft failure
//!
//! An unreachable mirror is not fatal. The result records the errors and
//! reports `changed=false`; the submission coordinator falls back to blind
//! retry against the table it already has. A client configured with no
//! mirror at all runs in the same degraded mode permanently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::network::endpoint::NodeRecord;
use crate::network::registry::{EndpointRegistry, RoutingTable};

// ---------------------------------------------------------------------------
// MirrorSource
// ---------------------------------------------------------------------------

/// Errors reported by an authoritative topology source.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The source could not be reached at all.
    #[error("mirror unreachable: {0}")]
    Unreachable(String),

    /// The source answered with something the client could not interpret.
    #[error("malformed mirror response: {0}")]
    Malformed(String),
}

/// A read-only lookup service for the current network topology.
///
/// Implementations wrap whatever mirror/query protocol the deployment uses;
/// the SDK only needs the resulting records.
#[async_trait]
pub trait MirrorSource: Send + Sync {
    /// Fetches the current set of node records.
    async fn fetch_nodes(&self) -> Result<Vec<NodeRecord>, MirrorError>;
}

// ---------------------------------------------------------------------------
// RefreshResult
// ---------------------------------------------------------------------------

/// The outcome of one (possibly coalesced) refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    /// `true` when the routing table actually changed.
    pub changed: bool,
    /// Errors encountered along the way. Non-empty with `changed=false`
    /// means the refresh failed softly and the old table remains in force.
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// TopologyRefresher
// ---------------------------------------------------------------------------

struct RefreshState {
    generation: u64,
    last: RefreshResult,
}

/// Fetches topology from a [`MirrorSource`] and publishes it into the
/// shared [`EndpointRegistry`].
pub struct TopologyRefresher {
    registry: Arc<EndpointRegistry>,
    source: Option<Arc<dyn MirrorSource>>,
    /// Mirrors `state.generation` for lock-free staleness checks.
    generation: AtomicU64,
    state: Mutex<RefreshState>,
}

impl TopologyRefresher {
    /// Creates a refresher. `source: None` selects degraded mode: every
    /// refresh is a no-op reporting `changed=false`.
    pub fn new(registry: Arc<EndpointRegistry>, source: Option<Arc<dyn MirrorSource>>) -> Self {
        Self {
            registry,
            source,
            generation: AtomicU64::new(0),
            state: Mutex::new(RefreshState {
                generation: 0,
                last: RefreshResult::default(),
            }),
        }
    }

    /// `true` when no authoritative source is configured.
    pub fn is_degraded(&self) -> bool {
        self.source.is_none()
    }

    /// Refreshes the routing table, coalescing concurrent calls into one
    /// in-flight mirror lookup. Never fails hard: mirror trouble is
    /// recorded in the result's `errors` and the existing table stays.
    pub async fn refresh(&self) -> RefreshResult {
        let source = match &self.source {
            Some(source) => Arc::clone(source),
            None => {
                debug!("topology refresh skipped: no mirror source (degraded mode)");
                return RefreshResult::default();
            }
        };

        let observed = self.generation.load(Ordering::Acquire);
        let mut state = self.state.lock().await;
        if state.generation != observed {
            // A refresh completed while we were waiting for the lock;
            // reuse its result rather than querying the mirror again.
            debug!("topology refresh coalesced with an in-flight refresh");
            return state.last.clone();
        }

        let result = match source.fetch_nodes().await {
            Ok(records) => {
                let table = RoutingTable::from_records(records);
                if table.is_empty() {
                    warn!("mirror returned an empty node set; keeping current table");
                    RefreshResult {
                        changed: false,
                        errors: vec!["mirror returned no nodes".to_string()],
                    }
                } else {
                    let changed = self.registry.replace(table);
                    if changed {
                        info!("topology refresh updated the routing table");
                    } else {
                        debug!("topology refresh found no changes");
                    }
                    RefreshResult {
                        changed,
                        errors: Vec::new(),
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "topology refresh failed softly");
                RefreshResult {
                    changed: false,
                    errors: vec![err.to_string()],
                }
            }
        };

        state.generation = state.generation.wrapping_add(1);
        self.generation.store(state.generation, Ordering::Release);
        state.last = result.clone();
        result
    }

    /// Spawns a background task that refreshes every `period`. The first
    /// refresh fires after one full period (startup refresh is the client's
    /// explicit call). Abort the handle to stop the task.
    pub fn spawn_periodic(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // interval fires immediately; skip that one
            loop {
                ticker.tick().await;
                let result = this.refresh().await;
                debug!(
                    changed = result.changed,
                    errors = result.errors.len(),
                    "periodic topology refresh"
                );
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use crate::entity::{AccountId, NodeId};
    use crate::network::endpoint::Endpoint;

    fn record(node: u64, account: u64) -> NodeRecord {
        NodeRecord::new(
            NodeId(node),
            AccountId::from_num(account),
            Endpoint::ipv4([10, 0, 0, node as u8], 50211),
        )
    }

    fn seeded_registry() -> Arc<EndpointRegistry> {
        Arc::new(EndpointRegistry::new(RoutingTable::from_records([
            record(0, 3),
            record(1, 4),
        ])))
    }

    /// Mirror that counts lookups and takes a moment to answer, so tests
    /// can overlap calls deliberately.
    struct CountingMirror {
        lookups: AtomicUsize,
        response: Vec<NodeRecord>,
        delay: Duration,
    }

    #[async_trait]
    impl MirrorSource for CountingMirror {
        async fn fetch_nodes(&self) -> Result<Vec<NodeRecord>, MirrorError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.response.clone())
        }
    }

    struct FailingMirror;

    #[async_trait]
    impl MirrorSource for FailingMirror {
        async fn fetch_nodes(&self) -> Result<Vec<NodeRecord>, MirrorError> {
            Err(MirrorError::Unreachable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn degraded_mode_is_a_no_op() {
        let registry = seeded_registry();
        let refresher = TopologyRefresher::new(Arc::clone(&registry), None);
        assert!(refresher.is_degraded());

        let before = registry.snapshot();
        let result = refresher.refresh().await;
        assert!(!result.changed);
        assert!(result.errors.is_empty());
        assert_eq!(*before, *registry.snapshot());
    }

    #[tokio::test]
    async fn refresh_publishes_new_topology() {
        let registry = seeded_registry();
        let mirror = Arc::new(CountingMirror {
            lookups: AtomicUsize::new(0),
            // Same nodes, swapped owning accounts.
            response: vec![record(0, 4), record(1, 3)],
            delay: Duration::ZERO,
        });
        let refresher = TopologyRefresher::new(Arc::clone(&registry), Some(mirror));

        let result = refresher.refresh().await;
        assert!(result.changed);
        assert!(result.errors.is_empty());
        assert_eq!(
            registry.get(NodeId(0)).unwrap().account_id,
            AccountId::from_num(4)
        );
    }

    #[tokio::test]
    async fn unchanged_topology_reports_changed_false() {
        let registry = seeded_registry();
        let mirror = Arc::new(CountingMirror {
            lookups: AtomicUsize::new(0),
            response: vec![record(0, 3), record(1, 4)],
            delay: Duration::ZERO,
        });
        let refresher = TopologyRefresher::new(registry, Some(mirror));
        assert!(!refresher.refresh().await.changed);
    }

    #[tokio::test]
    async fn mirror_failure_is_soft() {
        let registry = seeded_registry();
        let refresher = TopologyRefresher::new(Arc::clone(&registry), Some(Arc::new(FailingMirror)));

        let result = refresher.refresh().await;
        assert!(!result.changed);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("connection refused"));
        // Old table still in force.
        assert_eq!(
            registry.get(NodeId(0)).unwrap().account_id,
            AccountId::from_num(3)
        );
    }

    #[tokio::test]
    async fn empty_mirror_response_keeps_current_table() {
        let registry = seeded_registry();
        let mirror = Arc::new(CountingMirror {
            lookups: AtomicUsize::new(0),
            response: vec![],
            delay: Duration::ZERO,
        });
        let refresher = TopologyRefresher::new(Arc::clone(&registry), Some(mirror));

        let result = refresher.refresh().await;
        assert!(!result.changed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    /// N concurrent refresh calls produce exactly one mirror
    /// lookup; the rest await the in-flight result.
    #[tokio::test]
    async fn concurrent_refreshes_coalesce_to_one_lookup() {
        let registry = seeded_registry();
        let mirror = Arc::new(CountingMirror {
            lookups: AtomicUsize::new(0),
            response: vec![record(0, 4), record(1, 3)],
            delay: Duration::from_millis(50),
        });
        let refresher = Arc::new(TopologyRefresher::new(
            registry,
            Some(Arc::clone(&mirror) as Arc<dyn MirrorSource>),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&refresher);
                tokio::spawn(async move { r.refresh().await })
            })
            .collect();

        for task in tasks {
            let result = task.await.unwrap();
            // Everyone sees the single in-flight refresh's outcome.
            assert!(result.changed);
        }
        assert_eq!(mirror.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_refreshes_query_again() {
        let registry = seeded_registry();
        let mirror = Arc::new(CountingMirror {
            lookups: AtomicUsize::new(0),
            response: vec![record(0, 3), record(1, 4)],
            delay: Duration::ZERO,
        });
        let refresher =
            TopologyRefresher::new(registry, Some(Arc::clone(&mirror) as Arc<dyn MirrorSource>));

        refresher.refresh().await;
        refresher.refresh().await;
        // Coalescing only merges *overlapping* calls.
        assert_eq!(mirror.lookups.load(Ordering::SeqCst), 2);
    }
}
