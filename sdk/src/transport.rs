//! # Transport Boundary
//!
//! The SDK never opens sockets itself. Everything that crosses the network
//! goes through the [`Transport`] trait: submit a signed transaction to one
//! node's endpoint, or query one node for a receipt. Implementations own
//! connection management, TLS, and framing; connection reuse is permitted
//! but not required.
//!
//! The envelope types here are the one place routing information appears.
//! The signed body bytes inside them never change between attempts — only
//! the envelope's target-node account does.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{AccountId, TransactionId};
use crate::network::endpoint::Endpoint;
use crate::transaction::builder::SignedTransaction;
use crate::transaction::types::{Receipt, StatusCode};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Transport-level failures, before any node-level status is available.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint did not answer at all (refused, reset, unresolvable).
    /// The submission coordinator treats this as a routing failure — the
    /// node may simply not live there any more.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The request timed out below the SDK's own per-attempt timeout.
    #[error("transport timeout")]
    Timeout,

    /// The connection worked but the bytes made no sense.
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// What actually goes on the wire for a submission: the immutable signed
/// transaction plus the account of the node it is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitEnvelope {
    /// Account owning the target node. The node rejects the envelope with
    /// [`StatusCode::InvalidNodeAccount`] if this does not name it — the
    /// signal that the client's routing table is stale.
    pub node_account: AccountId,
    /// The frozen signed transaction.
    pub signed: SignedTransaction,
}

/// A node's immediate answer to a submission: accepted into its pipeline,
/// or a precheck status explaining why not. Not consensus-final either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// The node's precheck status.
    pub status: StatusCode,
}

/// A node's answer to a receipt query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptResponse {
    /// Query status. [`StatusCode::is_receipt_pending`] codes mean "ask
    /// again later"; anything else is terminal and `receipt` is populated.
    pub status: StatusCode,
    /// The receipt, once the transaction has a terminal outcome.
    pub receipt: Option<Receipt>,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A request/response channel to consensus nodes, keyed by endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a signed transaction to the node at `endpoint`.
    async fn submit(
        &self,
        endpoint: &Endpoint,
        envelope: &SubmitEnvelope,
    ) -> Result<SubmitAck, TransportError>;

    /// Asks the node at `endpoint` for the outcome of a transaction.
    async fn query_receipt(
        &self,
        endpoint: &Endpoint,
        transaction_id: &TransactionId,
    ) -> Result<ReceiptResponse, TransportError>;
}
