//! Transaction construction via the builder pattern.
//!
//! [`TransactionBuilder`] assembles a [`TransactionBody`], mints (or accepts)
//! a [`TransactionId`], and freezes the canonical body bytes. From that point
//! the bytes are immutable: signing appends signatures over them, and
//! [`Transaction::into_signed`] produces the [`SignedTransaction`] that the
//! submission coordinator dispatches — identically — on every attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};
use thiserror::Error;

use crate::config::{DEFAULT_VALID_DURATION, MAX_VALID_DURATION};
use crate::entity::{AccountId, TransactionId};
use crate::transaction::signing::{PublicKey, SignaturePair};
use crate::transaction::types::{Operation, TransactionBody};

/// The network's memo size limit in bytes.
const MAX_MEMO_BYTES: usize = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from transaction construction and local signature preconditions.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No payer account was set.
    #[error("transaction has no payer account")]
    MissingPayer,

    /// The memo exceeds the network's size limit.
    #[error("memo is {got} bytes, limit is {limit}")]
    MemoTooLong {
        /// Actual memo length in bytes.
        got: usize,
        /// The network limit.
        limit: usize,
    },

    /// The validity window is wider than the network accepts.
    #[error("valid duration {got_secs}s exceeds network maximum {max_secs}s")]
    ValidDurationTooLong {
        /// Requested duration in seconds.
        got_secs: u64,
        /// Network maximum in seconds.
        max_secs: u64,
    },

    /// A transfer list that does not net to zero would mint or destroy value.
    #[error("transfer list does not sum to zero (sum = {sum})")]
    UnbalancedTransfer {
        /// The nonzero sum.
        sum: i64,
    },

    /// A declared required signer has not signed. Local precondition only —
    /// full authorization is validated by the network.
    #[error("missing signature from required signer {public_key}")]
    MissingSignature {
        /// Hex-encoded public key of the missing signer.
        public_key: String,
    },
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A built transaction: frozen body bytes plus accumulated signatures.
#[derive(Debug, Clone)]
pub struct Transaction {
    body: TransactionBody,
    body_bytes: Vec<u8>,
    required_signers: Vec<PublicKey>,
    /// Signatures gathered so far. Appended by
    /// [`sign_transaction`](crate::transaction::signing::sign_transaction).
    pub signatures: Vec<SignaturePair>,
}

impl Transaction {
    /// The logical transaction identity.
    pub fn id(&self) -> &TransactionId {
        &self.body.transaction_id
    }

    /// The body this transaction was frozen with.
    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    /// The canonical bytes every signature covers.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    /// `true` if `key` has already signed.
    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signatures.iter().any(|p| &p.public_key == key)
    }

    /// Finalizes into an immutable [`SignedTransaction`], checking that
    /// every declared required signer has signed.
    pub fn into_signed(self) -> Result<SignedTransaction, BuildError> {
        for required in &self.required_signers {
            if !self.is_signed_by(required) {
                return Err(BuildError::MissingSignature {
                    public_key: required.to_hex(),
                });
            }
        }
        Ok(SignedTransaction {
            transaction_id: self.body.transaction_id.clone(),
            valid_duration: self.body.valid_duration,
            body_bytes: self.body_bytes,
            signatures: self.signatures,
        })
    }
}

/// The immutable, dispatch-ready form of a transaction.
///
/// Cheap to clone and safe to re-dispatch: the id and body bytes are fixed,
/// so every retry the coordinator makes is bit-identical on the wire apart
/// from the envelope's target-node field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The logical transaction identity, stable across retries.
    pub transaction_id: TransactionId,
    /// Width of the validity window; with the id's valid-start this gives
    /// the coordinator its overall retry deadline.
    pub valid_duration: Duration,
    /// Canonical body bytes, exactly as signed.
    pub body_bytes: Vec<u8>,
    /// All gathered signatures over `body_bytes`.
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    /// SHA-384 hash of the signed body bytes — the value mirror services
    /// index transactions by. Stable across retries for the same reason the
    /// bytes are.
    pub fn transaction_hash(&self) -> [u8; 48] {
        let mut hasher = Sha384::new();
        hasher.update(&self.body_bytes);
        hasher.finalize().into()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Transaction`].
///
/// ```rust
/// use meridian_sdk::entity::AccountId;
/// use meridian_sdk::transaction::builder::TransactionBuilder;
/// use meridian_sdk::transaction::types::{Operation, Transfer};
///
/// let tx = TransactionBuilder::new(Operation::Transfer {
///     transfers: vec![
///         Transfer { account: AccountId::from_num(2), amount: -100 },
///         Transfer { account: AccountId::from_num(98), amount: 100 },
///     ],
/// })
/// .payer(AccountId::from_num(2))
/// .memo("rent")
/// .build()
/// .unwrap();
/// assert_eq!(tx.id().payer, AccountId::from_num(2));
/// ```
pub struct TransactionBuilder {
    operation: Operation,
    payer: Option<AccountId>,
    transaction_id: Option<TransactionId>,
    valid_duration: Duration,
    max_fee: u64,
    memo: String,
    required_signers: Vec<PublicKey>,
}

impl TransactionBuilder {
    /// Starts a builder for the given operation.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            payer: None,
            transaction_id: None,
            valid_duration: DEFAULT_VALID_DURATION,
            max_fee: 1_000_000,
            memo: String::new(),
            required_signers: Vec::new(),
        }
    }

    /// Sets the payer account. Required unless an explicit transaction id
    /// is provided.
    pub fn payer(mut self, payer: AccountId) -> Self {
        self.payer = Some(payer);
        self
    }

    /// Pins an explicit transaction id instead of minting one at build time.
    /// Used for deterministic tests and for scheduled-execution ids.
    pub fn transaction_id(mut self, id: TransactionId) -> Self {
        self.transaction_id = Some(id);
        self
    }

    /// Sets the validity-window width.
    pub fn valid_duration(mut self, duration: Duration) -> Self {
        self.valid_duration = duration;
        self
    }

    /// Sets the fee cap.
    pub fn max_fee(mut self, max_fee: u64) -> Self {
        self.max_fee = max_fee;
        self
    }

    /// Sets the memo (limit 100 bytes, enforced at build time).
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Declares a key that must have signed before submission. The payer's
    /// key is the usual entry; operations touching other accounts add more.
    pub fn require_signer(mut self, key: PublicKey) -> Self {
        if !self.required_signers.contains(&key) {
            self.required_signers.push(key);
        }
        self
    }

    /// Validates the inputs, mints the transaction id if none was pinned,
    /// and freezes the canonical body bytes.
    pub fn build(self) -> Result<Transaction, BuildError> {
        if self.memo.len() > MAX_MEMO_BYTES {
            return Err(BuildError::MemoTooLong {
                got: self.memo.len(),
                limit: MAX_MEMO_BYTES,
            });
        }
        if self.valid_duration > MAX_VALID_DURATION {
            return Err(BuildError::ValidDurationTooLong {
                got_secs: self.valid_duration.as_secs(),
                max_secs: MAX_VALID_DURATION.as_secs(),
            });
        }
        if let Operation::Transfer { transfers } = &self.operation {
            let sum: i64 = transfers.iter().map(|t| t.amount).sum();
            if sum != 0 {
                return Err(BuildError::UnbalancedTransfer { sum });
            }
        }

        let transaction_id = match self.transaction_id {
            Some(id) => id,
            None => TransactionId::generate(self.payer.ok_or(BuildError::MissingPayer)?),
        };

        let body = TransactionBody {
            transaction_id,
            valid_duration: self.valid_duration,
            max_fee: self.max_fee,
            memo: self.memo,
            operation: self.operation,
        };
        let body_bytes = body.canonical_bytes();

        Ok(Transaction {
            body,
            body_bytes,
            required_signers: self.required_signers,
            signatures: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::transaction::signing::{sign_transaction, PrivateKey};
    use crate::transaction::types::Transfer;

    fn transfer_op() -> Operation {
        Operation::Transfer {
            transfers: vec![
                Transfer {
                    account: AccountId::from_num(2),
                    amount: -100,
                },
                Transfer {
                    account: AccountId::from_num(98),
                    amount: 100,
                },
            ],
        }
    }

    #[test]
    fn build_requires_a_payer() {
        let err = TransactionBuilder::new(transfer_op()).build().unwrap_err();
        assert!(matches!(err, BuildError::MissingPayer));
    }

    #[test]
    fn explicit_transaction_id_needs_no_payer() {
        let id = TransactionId::generate(AccountId::from_num(2));
        let tx = TransactionBuilder::new(transfer_op())
            .transaction_id(id.clone())
            .build()
            .unwrap();
        assert_eq!(tx.id(), &id);
    }

    #[test]
    fn memo_limit_is_enforced() {
        let err = TransactionBuilder::new(transfer_op())
            .payer(AccountId::from_num(2))
            .memo("x".repeat(101))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MemoTooLong { got: 101, .. }));
    }

    #[test]
    fn oversized_validity_window_is_rejected() {
        let err = TransactionBuilder::new(transfer_op())
            .payer(AccountId::from_num(2))
            .valid_duration(Duration::from_secs(600))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::ValidDurationTooLong { .. }));
    }

    #[test]
    fn unbalanced_transfer_is_rejected() {
        let err = TransactionBuilder::new(Operation::Transfer {
            transfers: vec![Transfer {
                account: AccountId::from_num(2),
                amount: -100,
            }],
        })
        .payer(AccountId::from_num(2))
        .build()
        .unwrap_err();
        assert!(matches!(err, BuildError::UnbalancedTransfer { sum: -100 }));
    }

    #[test]
    fn token_burn_builds_without_balance_check() {
        let tx = TransactionBuilder::new(Operation::TokenBurn {
            token: EntityId::from_num(777),
            amount: 5,
        })
        .payer(AccountId::from_num(2))
        .build()
        .unwrap();
        assert_eq!(tx.body().operation.kind(), "token_burn");
    }

    #[test]
    fn into_signed_enforces_required_signers() {
        let key = PrivateKey::generate();
        let tx = TransactionBuilder::new(transfer_op())
            .payer(AccountId::from_num(2))
            .require_signer(key.public_key())
            .build()
            .unwrap();

        // Unsigned: the precondition fires.
        let err = tx.clone().into_signed().unwrap_err();
        assert!(matches!(err, BuildError::MissingSignature { .. }));

        // Signed: finalization succeeds and preserves id and bytes.
        let mut tx = tx;
        let id = tx.id().clone();
        let bytes = tx.body_bytes().to_vec();
        sign_transaction(&mut tx, &key);
        let signed = tx.into_signed().unwrap();
        assert_eq!(signed.transaction_id, id);
        assert_eq!(signed.body_bytes, bytes);
        assert_eq!(signed.signatures.len(), 1);
    }

    #[test]
    fn signed_transaction_clones_are_bit_identical() {
        // Idempotency across retries rests on this: the coordinator clones
        // the signed transaction per attempt and every clone is identical.
        let key = PrivateKey::generate();
        let mut tx = TransactionBuilder::new(transfer_op())
            .payer(AccountId::from_num(2))
            .build()
            .unwrap();
        sign_transaction(&mut tx, &key);
        let signed = tx.into_signed().unwrap();
        let clone = signed.clone();
        assert_eq!(signed, clone);
        assert_eq!(signed.transaction_hash(), clone.transaction_hash());
    }

    #[test]
    fn transaction_hash_tracks_the_body() {
        let key = PrivateKey::generate();
        let mut a = TransactionBuilder::new(transfer_op())
            .payer(AccountId::from_num(2))
            .memo("a")
            .build()
            .unwrap();
        let mut b = TransactionBuilder::new(transfer_op())
            .payer(AccountId::from_num(2))
            .memo("b")
            .build()
            .unwrap();
        sign_transaction(&mut a, &key);
        sign_transaction(&mut b, &key);
        let a = a.into_signed().unwrap();
        let b = b.into_signed().unwrap();
        assert_ne!(a.transaction_hash(), b.transaction_hash());
    }
}
