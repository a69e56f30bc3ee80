//! # Receipt Poller
//!
//! After a node acknowledges a transaction, the outcome still has to reach
//! consensus. The poller asks the network for the receipt until a terminal
//! status appears or its deadline elapses.
//!
//! This is a different animal from the submission coordinator's retry loop:
//! the transaction is already accepted, so the cadence is a gentle fixed
//! interval with light multiplicative growth, not exponential backoff. If
//! the node being polled stops answering, the poller falls back to another
//! node from the registry — a routing fallback only. It never re-signs and
//! never mints a new transaction id.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{
    POLL_GROWTH_FACTOR, POLL_INTERVAL_CAP, POLL_INTERVAL_FLOOR, RECEIPT_DEADLINE,
};
use crate::entity::{NodeId, TransactionId};
use crate::error::SdkError;
use crate::network::registry::EndpointRegistry;
use crate::submit::CancelFlag;
use crate::transaction::types::Receipt;
use crate::transport::{Transport, TransportError};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunables for receipt polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second and later polls, initially.
    pub interval_floor: Duration,
    /// Ceiling the poll interval grows toward.
    pub interval_cap: Duration,
    /// Per-poll interval growth factor.
    pub growth: f64,
    /// Overall time budget for obtaining a terminal receipt.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_floor: POLL_INTERVAL_FLOOR,
            interval_cap: POLL_INTERVAL_CAP,
            growth: POLL_GROWTH_FACTOR,
            deadline: RECEIPT_DEADLINE,
        }
    }
}

/// The next poll interval: light multiplicative growth, capped.
fn next_interval(current: Duration, config: &PollConfig) -> Duration {
    current.mul_f64(config.growth).min(config.interval_cap)
}

// ---------------------------------------------------------------------------
// ReceiptPoller
// ---------------------------------------------------------------------------

/// Polls nodes for the terminal outcome of a submitted transaction.
pub struct ReceiptPoller {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn Transport>,
    config: PollConfig,
}

impl ReceiptPoller {
    /// Wires the poller to its collaborators.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        transport: Arc<dyn Transport>,
        config: PollConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    /// Polls for the receipt of `transaction_id`, starting at `node_id`
    /// (normally the node that acknowledged the submission).
    ///
    /// Returns the receipt whatever its terminal status is — mapping a
    /// failed consensus status to an error is the caller's judgement call.
    pub async fn poll(
        &self,
        transaction_id: &TransactionId,
        node_id: NodeId,
        cancel: &CancelFlag,
    ) -> Result<Receipt, SdkError> {
        let deadline = Instant::now() + self.config.deadline;
        let mut interval = self.config.interval_floor;
        let mut current = node_id;
        let mut polls: u32 = 0;
        let mut last: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(SdkError::Cancelled);
            }
            if Instant::now() >= deadline {
                warn!(tx = %transaction_id, polls, "receipt deadline elapsed");
                return Err(SdkError::Exhausted {
                    attempts: polls,
                    last: last.unwrap_or_else(|| "no terminal receipt within deadline".to_string()),
                    last_node: Some(current),
                });
            }

            // The starting node may have vanished from the table entirely
            // (a refresh happened since acknowledgement); fall back.
            let node = match self.registry.get(current) {
                Ok(node) => node,
                Err(_) => {
                    let exclude: HashSet<NodeId> = [current].into();
                    let fallback = self
                        .registry
                        .select_node(&exclude)
                        .ok_or(SdkError::EmptyNetwork)?;
                    current = fallback.node_id;
                    fallback
                }
            };
            let endpoint = match node.primary_endpoint() {
                Some(ep) => ep.clone(),
                None => {
                    self.registry
                        .mark_unhealthy(current, self.config.interval_cap);
                    last = Some(format!("node {current} has no endpoints"));
                    current = self.fallback_from(current)?;
                    continue;
                }
            };

            polls += 1;
            match self.transport.query_receipt(&endpoint, transaction_id).await {
                Ok(response) if response.status.is_receipt_pending() => {
                    debug!(
                        tx = %transaction_id,
                        node = %current,
                        status = %response.status,
                        next_poll_ms = interval.as_millis() as u64,
                        "receipt not ready"
                    );
                    last = Some(response.status.to_string());
                    sleep(interval).await;
                    interval = next_interval(interval, &self.config);
                }
                Ok(response) => match response.receipt {
                    Some(receipt) => {
                        debug!(
                            tx = %transaction_id,
                            node = %current,
                            status = %receipt.status,
                            polls,
                            "terminal receipt obtained"
                        );
                        return Ok(receipt);
                    }
                    None => {
                        // Terminal status without a receipt body is a node
                        // bug; treat like a pending answer and move on.
                        warn!(
                            tx = %transaction_id,
                            node = %current,
                            status = %response.status,
                            "terminal status with no receipt attached"
                        );
                        last = Some(format!("empty receipt with status {}", response.status));
                        sleep(interval).await;
                        interval = next_interval(interval, &self.config);
                    }
                },
                Err(TransportError::Unreachable(reason)) => {
                    // Routing fallback, not resubmission: same transaction
                    // id, different node for the next poll. The fallback
                    // node still waits out the poll interval — a table
                    // where every node is dark must not turn into a spin
                    // loop against refused connections.
                    warn!(
                        tx = %transaction_id,
                        node = %current,
                        reason = %reason,
                        "poll target unreachable; falling back to another node"
                    );
                    self.registry
                        .mark_unhealthy(current, self.config.interval_cap);
                    last = Some(format!("node {current} unreachable: {reason}"));
                    current = self.fallback_from(current)?;
                    sleep(interval).await;
                    interval = next_interval(interval, &self.config);
                }
                Err(err) => {
                    debug!(
                        tx = %transaction_id,
                        node = %current,
                        error = %err,
                        "poll failed transiently"
                    );
                    last = Some(err.to_string());
                    sleep(interval).await;
                    interval = next_interval(interval, &self.config);
                }
            }
        }
    }

    /// Picks another node to poll, preferring anything but `current`.
    fn fallback_from(&self, current: NodeId) -> Result<NodeId, SdkError> {
        let exclude: HashSet<NodeId> = [current].into();
        self.registry
            .select_node(&exclude)
            .map(|r| r.node_id)
            .ok_or(SdkError::EmptyNetwork)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    use crate::entity::AccountId;
    use crate::network::endpoint::{Endpoint, NodeRecord};
    use crate::network::registry::RoutingTable;
    use crate::transaction::types::StatusCode;
    use crate::transport::{ReceiptResponse, SubmitAck, SubmitEnvelope};

    fn record(node: u64, account: u64) -> NodeRecord {
        NodeRecord::new(
            NodeId(node),
            AccountId::from_num(account),
            Endpoint::ipv4([10, 0, 0, node as u8], 50211),
        )
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            interval_floor: Duration::from_millis(1),
            interval_cap: Duration::from_millis(4),
            growth: 2.0,
            deadline: Duration::from_secs(5),
        }
    }

    fn tx_id() -> TransactionId {
        TransactionId::with_valid_start(AccountId::from_num(2), Utc::now())
    }

    fn receipt(status: StatusCode) -> Receipt {
        Receipt {
            transaction_id: tx_id_fixed(),
            status,
            consensus_at: Some(Utc::now()),
        }
    }

    fn tx_id_fixed() -> TransactionId {
        TransactionId::with_valid_start(
            AccountId::from_num(2),
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    /// Replays scripted receipt responses and records which endpoints were
    /// queried with which transaction ids.
    #[derive(Default)]
    struct ScriptedReceipts {
        script: Mutex<VecDeque<Result<ReceiptResponse, TransportError>>>,
        queries: Mutex<Vec<(Endpoint, TransactionId)>>,
    }

    impl ScriptedReceipts {
        fn with_script(
            script: impl IntoIterator<Item = Result<ReceiptResponse, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedReceipts {
        async fn submit(
            &self,
            _endpoint: &Endpoint,
            _envelope: &SubmitEnvelope,
        ) -> Result<SubmitAck, TransportError> {
            unimplemented!("poller tests never submit")
        }

        async fn query_receipt(
            &self,
            endpoint: &Endpoint,
            transaction_id: &TransactionId,
        ) -> Result<ReceiptResponse, TransportError> {
            self.queries
                .lock()
                .push((endpoint.clone(), transaction_id.clone()));
            self.script.lock().pop_front().unwrap_or(Ok(ReceiptResponse {
                status: StatusCode::ReceiptNotFound,
                receipt: None,
            }))
        }
    }

    fn poller(
        nodes: &[(u64, u64)],
        transport: Arc<ScriptedReceipts>,
        config: PollConfig,
    ) -> (ReceiptPoller, Arc<EndpointRegistry>) {
        let registry = Arc::new(EndpointRegistry::new(RoutingTable::from_records(
            nodes.iter().map(|&(n, a)| record(n, a)),
        )));
        (
            ReceiptPoller::new(Arc::clone(&registry), transport, config),
            registry,
        )
    }

    #[test]
    fn interval_grows_lightly_and_caps() {
        let config = PollConfig {
            interval_floor: Duration::from_millis(500),
            interval_cap: Duration::from_secs(5),
            growth: 1.25,
            deadline: Duration::from_secs(120),
        };
        let mut interval = config.interval_floor;
        let mut previous = Duration::ZERO;
        for _ in 0..32 {
            assert!(interval >= previous);
            assert!(interval <= config.interval_cap);
            previous = interval;
            interval = next_interval(interval, &config);
        }
        assert_eq!(interval, config.interval_cap);
    }

    #[tokio::test]
    async fn pending_then_success() {
        let transport = ScriptedReceipts::with_script([
            Ok(ReceiptResponse {
                status: StatusCode::ReceiptNotFound,
                receipt: None,
            }),
            Ok(ReceiptResponse {
                status: StatusCode::Unknown,
                receipt: None,
            }),
            Ok(ReceiptResponse {
                status: StatusCode::Ok,
                receipt: Some(receipt(StatusCode::Success)),
            }),
        ]);
        let (p, _) = poller(&[(0, 3)], Arc::clone(&transport), fast_config());

        let got = p
            .poll(&tx_id_fixed(), NodeId(0), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(got.status, StatusCode::Success);
        assert_eq!(transport.queries.lock().len(), 3);
    }

    #[tokio::test]
    async fn terminal_failure_receipt_is_returned_not_swallowed() {
        let transport = ScriptedReceipts::with_script([Ok(ReceiptResponse {
            status: StatusCode::Ok,
            receipt: Some(receipt(StatusCode::InsufficientPayerBalance)),
        })]);
        let (p, _) = poller(&[(0, 3)], transport, fast_config());

        let got = p
            .poll(&tx_id_fixed(), NodeId(0), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(got.status, StatusCode::InsufficientPayerBalance);
    }

    #[tokio::test]
    async fn unreachable_node_falls_back_without_new_id() {
        let transport = ScriptedReceipts::with_script([
            Err(TransportError::Unreachable("gone".into())),
            Ok(ReceiptResponse {
                status: StatusCode::Ok,
                receipt: Some(receipt(StatusCode::Success)),
            }),
        ]);
        let (p, registry) = poller(&[(0, 3), (1, 4)], Arc::clone(&transport), fast_config());

        let id = tx_id_fixed();
        let got = p.poll(&id, NodeId(0), &CancelFlag::new()).await.unwrap();
        assert_eq!(got.status, StatusCode::Success);

        let queries = transport.queries.lock();
        assert_eq!(queries.len(), 2);
        // Fallback switched endpoints but kept the exact transaction id.
        assert_ne!(queries[0].0, queries[1].0);
        assert_eq!(queries[0].1, id);
        assert_eq!(queries[1].1, id);
        assert!(!registry.is_healthy(NodeId(0)));
    }

    #[tokio::test]
    async fn deadline_produces_exhausted() {
        // Script is empty: every poll answers ReceiptNotFound.
        let transport = ScriptedReceipts::with_script([]);
        let mut config = fast_config();
        config.deadline = Duration::from_millis(20);
        let (p, _) = poller(&[(0, 3)], transport, config);

        let err = p
            .poll(&tx_id_fixed(), NodeId(0), &CancelFlag::new())
            .await
            .unwrap_err();
        match err {
            SdkError::Exhausted { attempts, last, .. } => {
                assert!(attempts >= 1);
                assert!(last.contains("ReceiptNotFound"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_polling() {
        let transport = ScriptedReceipts::with_script([]);
        let (p, _) = poller(&[(0, 3)], transport, fast_config());

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = p.poll(&tx_id(), NodeId(0), &cancel).await.unwrap_err();
        assert!(matches!(err, SdkError::Cancelled));
    }

    #[tokio::test]
    async fn all_nodes_dark_polls_at_the_configured_pace() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        /// Every query is refused; counts how many arrive.
        #[derive(Default)]
        struct DarkNetwork {
            queries: AtomicUsize,
        }

        #[async_trait]
        impl Transport for DarkNetwork {
            async fn submit(
                &self,
                _endpoint: &Endpoint,
                _envelope: &SubmitEnvelope,
            ) -> Result<SubmitAck, TransportError> {
                unimplemented!("poller tests never submit")
            }

            async fn query_receipt(
                &self,
                _endpoint: &Endpoint,
                _transaction_id: &TransactionId,
            ) -> Result<ReceiptResponse, TransportError> {
                self.queries.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Unreachable("refused".into()))
            }
        }

        let transport = Arc::new(DarkNetwork::default());
        let config = PollConfig {
            interval_floor: Duration::from_millis(20),
            interval_cap: Duration::from_millis(40),
            growth: 2.0,
            deadline: Duration::from_millis(200),
        };
        let registry = Arc::new(EndpointRegistry::new(RoutingTable::from_records([record(
            0, 3,
        )])));
        let p = ReceiptPoller::new(
            Arc::clone(&registry),
            Arc::clone(&transport) as Arc<dyn Transport>,
            config,
        );

        let err = p
            .poll(&tx_id_fixed(), NodeId(0), &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Exhausted { .. }));

        // 200 ms of 20/40 ms intervals allows a handful of queries. An
        // unpaced loop would rack up thousands before the deadline.
        let queries = transport.queries.load(Ordering::SeqCst);
        assert!(queries >= 2, "expected repeated fallback polls, got {queries}");
        assert!(queries <= 15, "polling spun without pacing: {queries} queries");
    }

    #[tokio::test]
    async fn vanished_node_is_replaced_from_the_registry() {
        let transport = ScriptedReceipts::with_script([Ok(ReceiptResponse {
            status: StatusCode::Ok,
            receipt: Some(receipt(StatusCode::Success)),
        })]);
        let (p, _) = poller(&[(1, 4)], Arc::clone(&transport), fast_config());

        // Node 0 is not in the table at all; the poller must pick node 1.
        let got = p
            .poll(&tx_id_fixed(), NodeId(0), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(got.status, StatusCode::Success);
        assert_eq!(transport.queries.lock().len(), 1);
    }
}
