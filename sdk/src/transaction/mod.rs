//! Transaction construction, signing, and the value types they share.
//!
//! The flow is: build ([`builder::TransactionBuilder`]) → sign
//! ([`signing::sign_transaction`]) → finalize
//! ([`builder::Transaction::into_signed`]) → hand the frozen
//! [`builder::SignedTransaction`] to the client for submission.

pub mod builder;
pub mod signing;
pub mod types;

pub use builder::{BuildError, SignedTransaction, Transaction, TransactionBuilder};
pub use signing::{sign_transaction, PrivateKey, PublicKey, SignaturePair};
pub use types::{Operation, Receipt, StatusCode, TransactionBody, Transfer};
