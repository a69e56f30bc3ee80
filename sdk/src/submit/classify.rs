//! Error classification as configuration.
//!
//! Which node status is a routing failure, which is transient, and which is
//! a hard "no" is protocol policy that evolves faster than SDK releases.
//! The defaults below enumerate the protocol's current codes, and every one
//! of them can be overridden at runtime via [`ClassificationTable::with_override`]
//! — deployments track protocol evolution with configuration, not forks.

use std::collections::HashMap;

use crate::transaction::types::StatusCode;
use crate::transport::TransportError;

/// How the coordinator reacts to an attempt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// The node accepted the transaction. Done submitting.
    Accepted,
    /// Retry after backoff; no topology refresh needed.
    Transient,
    /// The routing table is stale: refresh topology, then retry elsewhere.
    Routing,
    /// Non-retriable. Surface immediately without consuming the budget.
    Fatal,
}

/// Maps status codes and transport failures to [`RetryClass`].
#[derive(Debug, Clone, Default)]
pub struct ClassificationTable {
    overrides: HashMap<StatusCode, RetryClass>,
}

impl ClassificationTable {
    /// The built-in classification for current protocol codes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the class of one status code. Chainable.
    pub fn with_override(mut self, status: StatusCode, class: RetryClass) -> Self {
        self.overrides.insert(status, class);
        self
    }

    /// Classifies a node's precheck status.
    pub fn classify_status(&self, status: StatusCode) -> RetryClass {
        if let Some(class) = self.overrides.get(&status) {
            return *class;
        }
        match status {
            StatusCode::Ok | StatusCode::Success => RetryClass::Accepted,

            // The node we reached says it is not the node we addressed:
            // the account-to-endpoint mapping moved out from under us.
            StatusCode::InvalidNodeAccount => RetryClass::Routing,

            StatusCode::Busy | StatusCode::PlatformNotActive => RetryClass::Transient,

            // Receipt-query codes never appear in a submit ack; seeing one
            // here means something is wrong enough to retry gently.
            StatusCode::ReceiptNotFound | StatusCode::Unknown => RetryClass::Transient,

            StatusCode::InvalidTransaction
            | StatusCode::PayerAccountNotFound
            | StatusCode::TransactionExpired
            | StatusCode::InvalidSignature
            | StatusCode::InsufficientPayerBalance
            | StatusCode::DuplicateTransaction => RetryClass::Fatal,
        }
    }

    /// Classifies a transport-level failure.
    ///
    /// An unreachable endpoint is a routing failure — the node may simply
    /// not live at that address any more. Timeouts and garbled responses
    /// are transient: the node exists, it is just having a bad moment.
    pub fn classify_transport(&self, error: &TransportError) -> RetryClass {
        match error {
            TransportError::Unreachable(_) => RetryClass::Routing,
            TransportError::Timeout | TransportError::Protocol(_) => RetryClass::Transient,
        }
    }
}
