//! Core transaction value types: operations, bodies, status codes, receipts.
//!
//! The [`TransactionBody`] deliberately carries no routing information. Which
//! node a submission targets lives in the outer envelope
//! ([`crate::transport::SubmitEnvelope`]), so retrying against a different
//! node reuses the identical signed body bytes. That single decision is what
//! makes retry idempotent.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{AccountId, TokenId, TransactionId};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// One leg of a transfer: an account and a signed amount. Debits are
/// negative, credits positive; a well-formed transfer list sums to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// The account being debited or credited.
    pub account: AccountId,
    /// Amount in the smallest ledger denomination. Negative = debit.
    pub amount: i64,
}

/// The operation a transaction performs.
///
/// This is a deliberately narrow slice of the protocol's full operation set —
/// the submission machinery is identical for every operation type, so the SDK
/// carries just enough variants to exercise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Move value between accounts. The transfer list must net to zero.
    Transfer {
        /// Debit and credit legs.
        transfers: Vec<Transfer>,
    },
    /// Burn `amount` units of a token from its treasury.
    TokenBurn {
        /// The token being burned.
        token: TokenId,
        /// Units to burn, in the token's smallest denomination.
        amount: u64,
    },
}

impl Operation {
    /// A short stable name for logging and the canonical encoding.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::TokenBurn { .. } => "token_burn",
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionBody
// ---------------------------------------------------------------------------

/// Everything the payer signs: identity, validity window, fee cap, memo,
/// and the operation itself. No routing fields — see the module docs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    /// The logical transaction identity, stable across retries.
    pub transaction_id: TransactionId,
    /// Width of the validity window starting at the id's valid-start.
    pub valid_duration: Duration,
    /// The most the payer is willing to pay in fees.
    pub max_fee: u64,
    /// Free-form memo, capped by the network at 100 bytes.
    pub memo: String,
    /// What the transaction does.
    pub operation: Operation,
}

impl TransactionBody {
    /// The instant after which the network will refuse this transaction and
    /// the coordinator stops retrying.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.transaction_id.valid_start
            + chrono::Duration::from_std(self.valid_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(0))
    }

    /// Canonical byte serialization used for signing.
    ///
    /// A deterministic concatenation with null separators and fixed-width
    /// little-endian integers. Serde formats are avoided here on purpose:
    /// field ordering must be bit-stable across releases, and the signature
    /// is only as stable as these bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        // Transaction id: payer, valid-start (secs + nanos), nonce, flags.
        buf.extend_from_slice(self.transaction_id.payer.to_string().as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&self.transaction_id.valid_start.timestamp().to_le_bytes());
        buf.extend_from_slice(
            &self
                .transaction_id
                .valid_start
                .timestamp_subsec_nanos()
                .to_le_bytes(),
        );
        buf.extend_from_slice(&self.transaction_id.nonce.to_le_bytes());
        buf.push(self.transaction_id.scheduled as u8);

        // Validity window and fee cap.
        buf.extend_from_slice(&self.valid_duration.as_secs().to_le_bytes());
        buf.extend_from_slice(&self.max_fee.to_le_bytes());

        // Memo (length-prefixed).
        buf.extend_from_slice(&(self.memo.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.memo.as_bytes());

        // Operation: tag, then per-variant fields.
        buf.extend_from_slice(self.operation.kind().as_bytes());
        buf.push(0x00);
        match &self.operation {
            Operation::Transfer { transfers } => {
                buf.extend_from_slice(&(transfers.len() as u32).to_le_bytes());
                for t in transfers {
                    buf.extend_from_slice(t.account.to_string().as_bytes());
                    buf.push(0x00);
                    buf.extend_from_slice(&t.amount.to_le_bytes());
                }
            }
            Operation::TokenBurn { token, amount } => {
                buf.extend_from_slice(token.to_string().as_bytes());
                buf.push(0x00);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
        }

        buf
    }
}

// ---------------------------------------------------------------------------
// Status Codes
// ---------------------------------------------------------------------------

/// Node and receipt status codes, as fixed by the wire protocol.
///
/// The numeric values are protocol constants — they appear in the node's
/// acknowledgement and in receipts and must never be renumbered. Whether a
/// given code is retriable is *not* encoded here; that classification lives
/// in [`crate::submit::ClassificationTable`] because it is configuration,
/// not protocol fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StatusCode {
    /// The node accepted the transaction into its pipeline.
    Ok = 0,
    /// The transaction failed structural validation.
    InvalidTransaction = 1,
    /// The payer account does not exist.
    PayerAccountNotFound = 2,
    /// The target node account in the envelope does not match the node that
    /// received it. The client's routing table is stale.
    InvalidNodeAccount = 3,
    /// The validity window has already closed.
    TransactionExpired = 4,
    /// A signature failed verification.
    InvalidSignature = 7,
    /// The payer cannot cover the fee.
    InsufficientPayerBalance = 10,
    /// A transaction with this id was already submitted.
    DuplicateTransaction = 11,
    /// The node is overloaded and shed the request.
    Busy = 12,
    /// The node is up but not currently participating in consensus.
    PlatformNotActive = 13,
    /// No receipt is known yet for the queried transaction id.
    ReceiptNotFound = 14,
    /// The transaction has been seen but has not reached consensus.
    Unknown = 21,
    /// The transaction reached consensus and succeeded.
    Success = 22,
}

impl StatusCode {
    /// `true` for codes that mean "keep polling" rather than "done".
    pub fn is_receipt_pending(self) -> bool {
        matches!(self, StatusCode::ReceiptNotFound | StatusCode::Unknown)
    }

    /// `true` for the one code that means consensus success.
    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, *self as u32)
    }
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// The processing outcome of a submitted transaction, obtained by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The id the receipt belongs to.
    pub transaction_id: TransactionId,
    /// Terminal status once consensus has run; pending codes never appear
    /// in a returned receipt.
    pub status: StatusCode,
    /// When the transaction reached consensus, if it did.
    pub consensus_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    fn sample_body() -> TransactionBody {
        let payer = AccountId::from_num(2);
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        TransactionBody {
            transaction_id: TransactionId::with_valid_start(payer, ts),
            valid_duration: Duration::from_secs(120),
            max_fee: 100_000,
            memo: "hello".to_string(),
            operation: Operation::Transfer {
                transfers: vec![
                    Transfer {
                        account: EntityId::from_num(2),
                        amount: -500,
                    },
                    Transfer {
                        account: EntityId::from_num(98),
                        amount: 500,
                    },
                ],
            },
        }
    }

    #[test]
    fn canonical_bytes_are_deterministic() {
        assert_eq!(sample_body().canonical_bytes(), sample_body().canonical_bytes());
    }

    #[test]
    fn canonical_bytes_cover_every_field() {
        let base = sample_body();

        let mut memo = base.clone();
        memo.memo = "other".to_string();
        assert_ne!(base.canonical_bytes(), memo.canonical_bytes());

        let mut fee = base.clone();
        fee.max_fee += 1;
        assert_ne!(base.canonical_bytes(), fee.canonical_bytes());

        let mut dur = base.clone();
        dur.valid_duration = Duration::from_secs(60);
        assert_ne!(base.canonical_bytes(), dur.canonical_bytes());

        let mut nonce = base.clone();
        nonce.transaction_id.nonce = 9;
        assert_ne!(base.canonical_bytes(), nonce.canonical_bytes());
    }

    #[test]
    fn operation_variants_encode_differently() {
        let transfer = sample_body();
        let mut burn = sample_body();
        burn.operation = Operation::TokenBurn {
            token: EntityId::from_num(777),
            amount: 500,
        };
        assert_ne!(transfer.canonical_bytes(), burn.canonical_bytes());
        assert_eq!(burn.operation.kind(), "token_burn");
    }

    #[test]
    fn deadline_is_valid_start_plus_duration() {
        let body = sample_body();
        let expected = body.transaction_id.valid_start + chrono::Duration::seconds(120);
        assert_eq!(body.deadline(), expected);
    }

    #[test]
    fn pending_codes_are_pending_and_nothing_else_is() {
        for code in [
            StatusCode::Ok,
            StatusCode::Busy,
            StatusCode::Success,
            StatusCode::InvalidNodeAccount,
        ] {
            assert!(!code.is_receipt_pending(), "{code} is not pending");
        }
        assert!(StatusCode::ReceiptNotFound.is_receipt_pending());
        assert!(StatusCode::Unknown.is_receipt_pending());
    }

    #[test]
    fn status_display_includes_protocol_number() {
        assert_eq!(StatusCode::Success.to_string(), "Success(22)");
        assert_eq!(StatusCode::InvalidNodeAccount.to_string(), "InvalidNodeAccount(3)");
    }
}
