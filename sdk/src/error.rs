//! # Caller-Facing Error Taxonomy
//!
//! Transient and routing failures never reach the caller — the submission
//! coordinator absorbs and retries them up to its budget. What *does* reach
//! the caller is one of the terminal variants below, carrying enough context
//! (last node tried, attempt count, underlying status) to diagnose why the
//! retries stopped without reading the client's logs.

use thiserror::Error;

use crate::entity::NodeId;
use crate::network::topology::MirrorError;
use crate::transaction::builder::BuildError;
use crate::transaction::types::StatusCode;
use crate::transport::TransportError;

/// Terminal failures surfaced by the Meridian client.
#[derive(Debug, Error)]
pub enum SdkError {
    /// A node id was looked up that the routing table does not contain.
    /// Internally this is treated as a routing failure and triggers a
    /// topology refresh; it only surfaces when the refresh cannot help.
    #[error("unknown node {0} in routing table")]
    UnknownNode(NodeId),

    /// The routing table is empty — no statically configured nodes and no
    /// mirror source to fetch any from.
    #[error("routing table is empty; configure a network map or a mirror source")]
    EmptyNetwork,

    /// Transaction construction or a local signature precondition failed
    /// (e.g. a declared required signer had not signed by submission time).
    #[error("transaction build error: {0}")]
    Build(#[from] BuildError),

    /// The node rejected the transaction with a non-retriable status.
    /// Reported after exactly one attempt against `node`, with no refresh.
    #[error("non-retriable status {status} from node {node} after {attempts} attempt(s)")]
    Precondition {
        /// The status code the node answered with.
        status: StatusCode,
        /// The node that answered.
        node: NodeId,
        /// Attempts consumed (always 1 for the attempt that hit the error).
        attempts: u32,
    },

    /// The retry budget or the transaction's validity window ran out.
    #[error("exhausted after {attempts} attempt(s), last error: {last}")]
    Exhausted {
        /// Attempts consumed before giving up.
        attempts: u32,
        /// Description of the last underlying failure observed.
        last: String,
        /// The last node tried, if any attempt was dispatched at all.
        last_node: Option<NodeId>,
    },

    /// The transaction reached consensus with a failure status.
    #[error("transaction failed at consensus with status {status}")]
    ReceiptFailed {
        /// The terminal receipt status.
        status: StatusCode,
    },

    /// The caller cancelled the operation before it finished.
    #[error("operation cancelled by caller")]
    Cancelled,

    /// A transport-level failure that was not absorbed by retry.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The mirror/topology source failed in a way retry could not absorb.
    #[error("mirror error: {0}")]
    Mirror(#[from] MirrorError),
}

impl SdkError {
    /// `true` for errors produced by running out of retry budget or time,
    /// as opposed to a node telling us definitively "no".
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SdkError::Exhausted { .. })
    }
}
