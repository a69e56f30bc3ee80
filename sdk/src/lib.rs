// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian SDK — Client Library
//!
//! The client side of a Meridian network: build a transaction, sign it,
//! hand it to a node, and chase the receipt — while the network reshuffles
//! which account routes to which node underneath you.
//!
//! The SDK's one organizing idea is that *routing is mutable, transactions
//! are not*. A transaction id is minted once, the signed bytes are frozen
//! once, and everything that varies across retries (target node, endpoint,
//! backoff) lives outside the signature. That is what makes aggressive
//! retry safe: a node seeing the same bytes twice deduplicates instead of
//! double-spending.
//!
//! ## Architecture
//!
//! The modules mirror the actual concerns of a ledger client:
//!
//! - **entity** — Accounts, nodes, transaction ids. The nouns.
//! - **transaction** — Build, sign, freeze. Nothing here touches a socket.
//! - **network** — The routing table, its registry, and the refresher that
//!   reconciles it against a mirror source.
//! - **submit** — The retry state machine. Classification, backoff,
//!   failover; the part you are probably here for.
//! - **receipt** — Polls for the consensus outcome after acknowledgement.
//! - **transport** / **codec** — The seams where bytes enter and leave.
//!   Bring your own wire protocol; the SDK does not care.
//! - **client** — The front door that wires all of the above together.
//! - **config** — Timing constants and retry budgets, with the defaults
//!   every method of tuning starts from.
//! - **error** — What reaches the caller when retry could not save you.
//!
//! ## Design Philosophy
//!
//! 1. Retries are sequential per transaction. The network never has to
//!    disambiguate two live copies of one submission.
//! 2. Routing failures refresh topology; transient failures back off. The
//!    two are different problems and get different medicine.
//! 3. A dead mirror degrades the client, it does not stop it.
//! 4. If it goes on the wire, it has tests. Plural.

pub mod client;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod network;
pub mod receipt;
pub mod submit;
pub mod transaction;
pub mod transport;

pub use client::{Client, ClientBuilder, PendingHandle};
pub use entity::{AccountId, EntityId, NodeId, TokenId, TransactionId};
pub use error::SdkError;
pub use transaction::{
    sign_transaction, Operation, PrivateKey, PublicKey, Receipt, SignedTransaction, StatusCode,
    Transaction, TransactionBuilder, Transfer,
};
