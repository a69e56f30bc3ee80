//! # Submission Coordinator
//!
//! The central state machine of the SDK. One logical transaction moves
//! through `Unsent → Sent → {Acknowledged, TransientFailure,
//! RoutingFailure, Exhausted}`, and every transition is an explicit typed
//! result here — never an exception-shaped control flow buried in a call
//! stack.
//!
//! The invariants the loop maintains:
//!
//! - **Idempotency.** The same [`SignedTransaction`] bytes and the same
//!   transaction id go out on every attempt. Only the envelope's
//!   target-node account changes.
//! - **Sequential attempts.** Per transaction, attempts never overlap; the
//!   network never has to disambiguate two in-flight copies. Different
//!   transactions submit concurrently without coordination.
//! - **Routing failures refresh, transient failures back off.** A stale
//!   routing answer triggers one (coalesced) topology refresh and an
//!   immediate re-route; a busy node just earns a capped exponential delay.
//! - **Two clocks.** Each attempt has its own timeout (transient on
//!   expiry); the transaction's validity window is the overall deadline
//!   (exhaustion on expiry).

pub mod backoff;
pub mod classify;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{
    ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, MAX_BACKOFF, MIN_BACKOFF, NODE_COOLDOWN,
};
use crate::entity::{AccountId, NodeId};
use crate::error::SdkError;
use crate::network::registry::EndpointRegistry;
use crate::network::topology::TopologyRefresher;
use crate::transaction::builder::SignedTransaction;
use crate::transaction::types::StatusCode;
use crate::transport::{SubmitEnvelope, Transport, TransportError};

pub use backoff::Backoff;
pub use classify::{ClassificationTable, RetryClass};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunables for the submission loop.
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Attempts before giving up, deadline permitting.
    pub max_attempts: u32,
    /// Transient-retry delay schedule.
    pub backoff: Backoff,
    /// Per-attempt network timeout; expiry counts as a transient failure.
    pub attempt_timeout: Duration,
    /// How long a node that produced a routing failure is deprioritized.
    pub node_cooldown: Duration,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::new(MIN_BACKOFF, MAX_BACKOFF),
            attempt_timeout: ATTEMPT_TIMEOUT,
            node_cooldown: NODE_COOLDOWN,
        }
    }
}

// ---------------------------------------------------------------------------
// CancelFlag
// ---------------------------------------------------------------------------

/// Cooperative cancellation for a submission and its receipt wait.
///
/// Cancelling stops further client-side retries and polls. It does not
/// un-submit anything — a transaction already acknowledged by a node may
/// still reach consensus.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// `true` once [`cancel`](CancelFlag::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// State machine vocabulary
// ---------------------------------------------------------------------------

/// The coordinator's observable states, used in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    /// No attempt dispatched yet.
    Unsent,
    /// An attempt is on the wire.
    Sent,
    /// A node accepted the transaction into its pipeline.
    Acknowledged,
    /// The last attempt failed retriably; backing off.
    TransientFailure,
    /// The last attempt revealed stale routing; refreshing topology.
    RoutingFailure,
    /// Retry budget or validity window ran out.
    Exhausted,
}

/// A successful handoff to a node. Not consensus-final — the receipt poller
/// owns the rest of the story.
#[derive(Debug, Clone)]
pub struct Acknowledgement {
    /// The node that accepted the transaction.
    pub node_id: NodeId,
    /// That node's owning account at dispatch time.
    pub node_account: AccountId,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
}

/// What one dispatch attempt produced, before classification.
enum AttemptOutcome {
    Status(StatusCode),
    Transport(TransportError),
    TimedOut,
}

// ---------------------------------------------------------------------------
// SubmissionCoordinator
// ---------------------------------------------------------------------------

/// Drives a signed transaction to acknowledgement across node failures and
/// topology drift.
pub struct SubmissionCoordinator {
    registry: Arc<EndpointRegistry>,
    refresher: Arc<TopologyRefresher>,
    transport: Arc<dyn Transport>,
    classify: ClassificationTable,
    config: SubmitConfig,
}

impl SubmissionCoordinator {
    /// Wires the coordinator to its collaborators.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        refresher: Arc<TopologyRefresher>,
        transport: Arc<dyn Transport>,
        classify: ClassificationTable,
        config: SubmitConfig,
    ) -> Self {
        Self {
            registry,
            refresher,
            transport,
            classify,
            config,
        }
    }

    /// Submits `signed` until a node acknowledges it, a non-retriable
    /// status arrives, or the retry budget / validity window runs out.
    ///
    /// Attempts are strictly sequential for this transaction. The identical
    /// signed bytes are dispatched every time.
    pub async fn submit(
        &self,
        signed: &SignedTransaction,
        cancel: &CancelFlag,
    ) -> Result<Acknowledgement, SdkError> {
        let id = &signed.transaction_id;
        let deadline = signed.transaction_id.valid_start
            + chrono::Duration::from_std(signed.valid_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(0));

        let mut tried: HashSet<NodeId> = HashSet::new();
        let mut last_error: Option<String> = None;
        let mut last_node: Option<NodeId> = None;

        debug!(tx = %id, state = ?SubmitState::Unsent, "submission starting");

        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(SdkError::Cancelled);
            }
            if Utc::now() >= deadline {
                warn!(tx = %id, state = ?SubmitState::Exhausted, "validity window closed");
                return Err(SdkError::Exhausted {
                    attempts: attempt - 1,
                    last: last_error
                        .unwrap_or_else(|| "validity window closed before dispatch".to_string()),
                    last_node,
                });
            }

            let node = self
                .registry
                .select_node(&tried)
                .ok_or(SdkError::EmptyNetwork)?;
            let endpoint = match node.primary_endpoint() {
                Some(ep) => ep.clone(),
                None => {
                    // A record with no endpoints is as stale as routing gets.
                    tried.insert(node.node_id);
                    last_node = Some(node.node_id);
                    last_error = Some(format!("node {} has no endpoints", node.node_id));
                    self.registry
                        .mark_unhealthy(node.node_id, self.config.node_cooldown);
                    self.refresher.refresh().await;
                    continue;
                }
            };
            tried.insert(node.node_id);
            last_node = Some(node.node_id);

            let envelope = SubmitEnvelope {
                node_account: node.account_id.clone(),
                signed: signed.clone(),
            };
            debug!(
                tx = %id,
                node = %node.node_id,
                endpoint = %endpoint,
                attempt,
                state = ?SubmitState::Sent,
                "dispatching"
            );

            let outcome = match timeout(
                self.config.attempt_timeout,
                self.transport.submit(&endpoint, &envelope),
            )
            .await
            {
                Ok(Ok(ack)) => AttemptOutcome::Status(ack.status),
                Ok(Err(err)) => AttemptOutcome::Transport(err),
                Err(_) => AttemptOutcome::TimedOut,
            };

            let (class, description) = match &outcome {
                AttemptOutcome::Status(status) => {
                    (self.classify.classify_status(*status), status.to_string())
                }
                AttemptOutcome::Transport(err) => {
                    (self.classify.classify_transport(err), err.to_string())
                }
                AttemptOutcome::TimedOut => (
                    RetryClass::Transient,
                    "per-attempt timeout elapsed".to_string(),
                ),
            };

            match class {
                RetryClass::Accepted => {
                    info!(
                        tx = %id,
                        node = %node.node_id,
                        attempts = attempt,
                        state = ?SubmitState::Acknowledged,
                        "transaction accepted"
                    );
                    return Ok(Acknowledgement {
                        node_id: node.node_id,
                        node_account: node.account_id,
                        attempts: attempt,
                    });
                }
                RetryClass::Fatal => {
                    warn!(
                        tx = %id,
                        node = %node.node_id,
                        error = %description,
                        state = ?SubmitState::Exhausted,
                        "non-retriable failure"
                    );
                    // classify_transport never returns Fatal and timeouts are
                    // always Transient; the non-status arms only keep this
                    // match total.
                    return match outcome {
                        AttemptOutcome::Status(status) => Err(SdkError::Precondition {
                            status,
                            node: node.node_id,
                            attempts: attempt,
                        }),
                        AttemptOutcome::Transport(err) => Err(SdkError::Transport(err)),
                        AttemptOutcome::TimedOut => {
                            Err(SdkError::Transport(TransportError::Timeout))
                        }
                    };
                }
                RetryClass::Routing => {
                    warn!(
                        tx = %id,
                        node = %node.node_id,
                        error = %description,
                        state = ?SubmitState::RoutingFailure,
                        "stale routing; refreshing topology"
                    );
                    self.registry
                        .mark_unhealthy(node.node_id, self.config.node_cooldown);
                    let refresh = self.refresher.refresh().await;
                    debug!(
                        tx = %id,
                        changed = refresh.changed,
                        errors = refresh.errors.len(),
                        "topology refresh after routing failure"
                    );
                    last_error = Some(description);
                    // No backoff: the refresh round trip is the spacing.
                }
                RetryClass::Transient => {
                    let delay = self.config.backoff.jittered(attempt);
                    debug!(
                        tx = %id,
                        node = %node.node_id,
                        error = %description,
                        delay_ms = delay.as_millis() as u64,
                        state = ?SubmitState::TransientFailure,
                        "transient failure; backing off"
                    );
                    last_error = Some(description);
                    sleep(delay).await;
                }
            }
        }

        warn!(
            tx = %id,
            attempts = self.config.max_attempts,
            state = ?SubmitState::Exhausted,
            "retry budget exhausted"
        );
        Err(SdkError::Exhausted {
            attempts: self.config.max_attempts,
            last: last_error.unwrap_or_else(|| "no attempt dispatched".to_string()),
            last_node,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
