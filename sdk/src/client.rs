//! # Client
//!
//! The front door of the SDK. A [`Client`] owns one registry, one topology
//! refresher, one submission coordinator, and one receipt poller, all wired
//! to the same shared state. Concurrent submissions on one client are
//! independent of each other; what they share is the routing table and the
//! coalesced refresh path.
//!
//! Construction goes through [`ClientBuilder`]: seed a network (an explicit
//! address book, an authoritative mirror source, or both), hand over a
//! transport, tune what needs tuning, build. [`Client::connect`] is the
//! common case rolled into one call: build, then perform the startup
//! topology refresh before the first submission can race a stale table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::REFRESH_PERIOD;
use crate::entity::{AccountId, NodeId, TransactionId};
use crate::error::SdkError;
use crate::network::endpoint::ParseEndpointError;
use crate::network::registry::{EndpointRegistry, RoutingTable};
use crate::network::topology::{MirrorSource, RefreshResult, TopologyRefresher};
use crate::receipt::{PollConfig, ReceiptPoller};
use crate::submit::{
    Acknowledgement, CancelFlag, ClassificationTable, SubmissionCoordinator, SubmitConfig,
};
use crate::transaction::builder::SignedTransaction;
use crate::transaction::types::Receipt;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`Client`] piece by piece.
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    table: RoutingTable,
    mirror: Option<Arc<dyn MirrorSource>>,
    submit_config: SubmitConfig,
    poll_config: PollConfig,
    classification: ClassificationTable,
    refresh_period: Option<Duration>,
}

impl ClientBuilder {
    /// Starts a builder around the transport the client will dial nodes
    /// with. Everything else has a default.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            table: RoutingTable::default(),
            mirror: None,
            submit_config: SubmitConfig::default(),
            poll_config: PollConfig::default(),
            classification: ClassificationTable::new(),
            refresh_period: Some(REFRESH_PERIOD),
        }
    }

    /// Seeds the routing table from a `"host:port" -> account` map.
    pub fn network(mut self, map: &HashMap<String, AccountId>) -> Result<Self, ParseEndpointError> {
        self.table = RoutingTable::from_address_map(map)?;
        Ok(self)
    }

    /// Seeds the routing table from ready-made records.
    pub fn routing_table(mut self, table: RoutingTable) -> Self {
        self.table = table;
        self
    }

    /// Configures the authoritative topology source. Without one the client
    /// runs degraded: the seeded table is all it ever has.
    pub fn mirror(mut self, source: Arc<dyn MirrorSource>) -> Self {
        self.mirror = Some(source);
        self
    }

    /// Overrides the submission-loop tunables.
    pub fn submit_config(mut self, config: SubmitConfig) -> Self {
        self.submit_config = config;
        self
    }

    /// Overrides the receipt-polling tunables.
    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.poll_config = config;
        self
    }

    /// Overrides the status-code classification table.
    pub fn classification(mut self, table: ClassificationTable) -> Self {
        self.classification = table;
        self
    }

    /// Sets the background refresh cadence, or disables the background task
    /// entirely with `None`. Refresh-on-routing-failure is unaffected.
    pub fn refresh_period(mut self, period: Option<Duration>) -> Self {
        self.refresh_period = period;
        self
    }

    /// Builds the client. Does not touch the network; see
    /// [`Client::connect`] for build-plus-startup-refresh.
    ///
    /// # Panics
    ///
    /// When a mirror and a refresh period are both configured, the
    /// background refresh task is spawned here — that combination requires
    /// a running Tokio runtime. Without a mirror (or with
    /// `refresh_period(None)`) construction is plain synchronous code.
    pub fn build(self) -> Client {
        let registry = Arc::new(EndpointRegistry::new(self.table));
        let refresher = Arc::new(TopologyRefresher::new(
            Arc::clone(&registry),
            self.mirror,
        ));
        let coordinator = SubmissionCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&refresher),
            Arc::clone(&self.transport),
            self.classification,
            self.submit_config,
        );
        let poller = Arc::new(ReceiptPoller::new(
            Arc::clone(&registry),
            Arc::clone(&self.transport),
            self.poll_config,
        ));

        let refresh_task = match self.refresh_period {
            Some(period) if !refresher.is_degraded() => Some(refresher.spawn_periodic(period)),
            _ => None,
        };
        if refresher.is_degraded() {
            info!("client built without a mirror source; topology refresh is disabled");
        }

        Client {
            registry,
            refresher,
            coordinator,
            poller,
            refresh_task,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A session against one Meridian network.
///
/// Cheap to share by reference; submissions on separate tasks proceed
/// concurrently and independently.
pub struct Client {
    registry: Arc<EndpointRegistry>,
    refresher: Arc<TopologyRefresher>,
    coordinator: SubmissionCoordinator,
    poller: Arc<ReceiptPoller>,
    refresh_task: Option<JoinHandle<()>>,
}

impl Client {
    /// Builds a client and performs the startup topology refresh, so the
    /// first submission routes on fresh data. Mirror trouble at startup is
    /// soft, same as everywhere else: the seeded table stays in force.
    pub async fn connect(builder: ClientBuilder) -> Self {
        let client = builder.build();
        let result = client.refresh_network().await;
        debug!(
            changed = result.changed,
            errors = result.errors.len(),
            "startup topology refresh"
        );
        client
    }

    /// Submits a signed transaction and returns a handle for the receipt
    /// wait. The handle's transaction id is the one minted at build time —
    /// nothing on the retry path ever changes it.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<PendingHandle, SdkError> {
        let cancel = CancelFlag::new();
        let ack = self.coordinator.submit(signed, &cancel).await?;
        Ok(PendingHandle {
            transaction_id: signed.transaction_id.clone(),
            acknowledgement: ack,
            cancel,
            poller: Arc::clone(&self.poller),
        })
    }

    /// Submit-and-wait in one call: dispatch, then poll for the terminal
    /// receipt, failing on a non-success consensus status.
    pub async fn execute(&self, signed: &SignedTransaction) -> Result<Receipt, SdkError> {
        self.submit(signed).await?.get_receipt().await
    }

    /// The current `"host:port" -> account` view of the routing table.
    pub fn get_network(&self) -> HashMap<String, AccountId> {
        self.registry.address_book()
    }

    /// Replaces the routing table from an explicit address book, the
    /// operator-override path. Returns `true` when the table changed.
    pub fn set_network(
        &self,
        map: &HashMap<String, AccountId>,
    ) -> Result<bool, ParseEndpointError> {
        Ok(self.registry.replace(RoutingTable::from_address_map(map)?))
    }

    /// Forces a topology refresh now, coalescing with any already in
    /// flight.
    pub async fn refresh_network(&self) -> RefreshResult {
        self.refresher.refresh().await
    }

    /// Polls for the receipt of an arbitrary transaction id, without a
    /// [`PendingHandle`]. Starts at any node in the table; the poller fails
    /// over on its own. Does not require consensus success — callers get
    /// the receipt whatever its status.
    pub async fn query_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Receipt, SdkError> {
        let node = self
            .registry
            .select_node(&std::collections::HashSet::new())
            .ok_or(SdkError::EmptyNetwork)?;
        self.poller
            .poll(transaction_id, node.node_id, &CancelFlag::new())
            .await
    }

    /// `true` when no mirror source is configured and the client routes on
    /// its seeded table alone.
    pub fn is_degraded(&self) -> bool {
        self.refresher.is_degraded()
    }

    /// The shared registry, for wiring custom components in tests and
    /// advanced integrations.
    pub fn registry(&self) -> Arc<EndpointRegistry> {
        Arc::clone(&self.registry)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// PendingHandle
// ---------------------------------------------------------------------------

/// An acknowledged submission awaiting its consensus outcome.
pub struct PendingHandle {
    /// The id the network will report the receipt under.
    pub transaction_id: TransactionId,
    acknowledgement: Acknowledgement,
    cancel: CancelFlag,
    poller: Arc<ReceiptPoller>,
}

// Hand-rolled: the poller field is a trait-object graph with no Debug.
impl fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHandle")
            .field("transaction_id", &self.transaction_id)
            .field("node_id", &self.acknowledgement.node_id)
            .field("attempts", &self.acknowledgement.attempts)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl PendingHandle {
    /// The node that acknowledged the submission.
    pub fn node_id(&self) -> NodeId {
        self.acknowledgement.node_id
    }

    /// Submission attempts consumed, including the successful one.
    pub fn attempts(&self) -> u32 {
        self.acknowledgement.attempts
    }

    /// Waits for the terminal receipt, then requires consensus success.
    ///
    /// A terminal receipt with a failure status becomes
    /// [`SdkError::ReceiptFailed`]; the transaction is over either way.
    pub async fn get_receipt(&self) -> Result<Receipt, SdkError> {
        let receipt = self.get_receipt_any_status().await?;
        if receipt.status.is_success() {
            Ok(receipt)
        } else {
            Err(SdkError::ReceiptFailed {
                status: receipt.status,
            })
        }
    }

    /// Waits for the terminal receipt without judging its status. Callers
    /// that treat, say, a duplicate as success use this.
    pub async fn get_receipt_any_status(&self) -> Result<Receipt, SdkError> {
        self.poller
            .poll(
                &self.transaction_id,
                self.acknowledgement.node_id,
                &self.cancel,
            )
            .await
    }

    /// Stops further client-side polling for this transaction. Does not and
    /// cannot withdraw the transaction from the network.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
