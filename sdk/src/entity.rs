//! # Ledger Identities
//!
//! Every addressable thing on the Meridian ledger — accounts, nodes, tokens,
//! topics — shares one identifier shape: a `(shard, realm, number)` triple,
//! or an alias (raw bytes derived from a public key or an EVM-style address)
//! in place of the number. The two forms are a proper sum type here, not a
//! pair of nullable fields: you cannot construct an [`EntityId`] that has
//! both a number and an alias, and matching on [`EntityTarget`] is exhaustive
//! by construction.
//!
//! Node identity is deliberately separate. A [`NodeId`] is the stable numeric
//! identifier of a consensus node; the [`AccountId`] that *routes* to that
//! node can change out from under the client, which is exactly the condition
//! the topology refresher exists to repair.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing identifier strings.
#[derive(Debug, Error)]
pub enum ParseIdError {
    /// The string does not have the `shard.realm.num` shape.
    #[error("malformed entity id: {0:?} (expected shard.realm.num)")]
    MalformedEntityId(String),

    /// A numeric component could not be parsed.
    #[error("invalid numeric component in {0:?}")]
    InvalidNumber(String),

    /// The transaction id string is missing its `@seconds.nanos` part.
    #[error("malformed transaction id: {0:?} (expected payer@seconds.nanos)")]
    MalformedTransactionId(String),
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// The payload of an [`EntityId`]: a network-assigned number or an alias.
///
/// Exactly one of the two exists for any identity. Aliases are opaque bytes
/// at this layer — key-derived and EVM-style aliases are distinguished only
/// by the network, never by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityTarget {
    /// A network-assigned entity number.
    Num(u64),
    /// A raw alias (public-key-derived or EVM-style address bytes).
    Alias(Vec<u8>),
}

/// A ledger entity identifier: shard, realm, and a number-or-alias target.
///
/// Shard and realm are assigned by the network and immutable once the entity
/// is minted. Accounts, tokens, topics, contracts, and schedules all use this
/// shape; the type aliases below exist for readability at call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// Shard number. Zero on every network deployed to date.
    pub shard: u64,
    /// Realm number. Zero on every network deployed to date.
    pub realm: u64,
    /// The number-or-alias payload.
    pub target: EntityTarget,
}

/// An account identity — payer of transactions and routing key for nodes.
pub type AccountId = EntityId;

/// A token identity. Same shape as an account id.
pub type TokenId = EntityId;

impl EntityId {
    /// Creates an id with an explicit shard and realm.
    pub fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self {
            shard,
            realm,
            target: EntityTarget::Num(num),
        }
    }

    /// Creates an id in the default shard and realm (`0.0.num`).
    pub fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }

    /// Creates an alias-form id in the given shard and realm.
    pub fn from_alias(shard: u64, realm: u64, alias: Vec<u8>) -> Self {
        Self {
            shard,
            realm,
            target: EntityTarget::Alias(alias),
        }
    }

    /// Returns the entity number, or `None` for alias-form ids.
    pub fn num(&self) -> Option<u64> {
        match &self.target {
            EntityTarget::Num(n) => Some(*n),
            EntityTarget::Alias(_) => None,
        }
    }

    /// Returns `true` if this id is in alias form.
    pub fn is_alias(&self) -> bool {
        matches!(self.target, EntityTarget::Alias(_))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            EntityTarget::Num(n) => write!(f, "{}.{}.{}", self.shard, self.realm, n),
            EntityTarget::Alias(bytes) => {
                write!(f, "{}.{}.{}", self.shard, self.realm, hex::encode(bytes))
            }
        }
    }
}

impl FromStr for EntityId {
    type Err = ParseIdError;

    /// Parses `shard.realm.num`. A non-numeric final component is treated
    /// as a hex-encoded alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let (shard, realm, tail) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(ParseIdError::MalformedEntityId(s.to_string())),
        };
        let shard: u64 = shard
            .parse()
            .map_err(|_| ParseIdError::InvalidNumber(s.to_string()))?;
        let realm: u64 = realm
            .parse()
            .map_err(|_| ParseIdError::InvalidNumber(s.to_string()))?;
        if let Ok(num) = tail.parse::<u64>() {
            return Ok(EntityId::new(shard, realm, num));
        }
        let alias = hex::decode(tail).map_err(|_| ParseIdError::InvalidNumber(s.to_string()))?;
        Ok(EntityId::from_alias(shard, realm, alias))
    }
}

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// The stable numeric identifier of a consensus node.
///
/// Distinct from the [`AccountId`] that currently owns routing to the node —
/// the account mapping is mutable network state, the node id is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(n: u64) -> Self {
        NodeId(n)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// The unique identifier of a logical transaction.
///
/// Payer account plus a client-chosen valid-start instant, with an optional
/// nonce and scheduled flag. The id is minted once, before signing, and then
/// reused verbatim across every retry and resubmission — consensus nodes use
/// it for duplicate detection, so a retry that minted a fresh id would be a
/// brand-new transaction and could double-spend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    /// The account that pays for the transaction.
    pub payer: AccountId,
    /// Start of the validity window. The transaction is accepted by the
    /// network only between `valid_start` and `valid_start + valid_duration`.
    pub valid_start: DateTime<Utc>,
    /// Disambiguates multiple transactions sharing a payer and valid-start.
    pub nonce: u64,
    /// Marks an id that identifies the execution of a scheduled transaction.
    pub scheduled: bool,
}

impl TransactionId {
    /// Mints a fresh id for `payer`.
    ///
    /// The valid-start is backdated by a few random milliseconds so that two
    /// ids minted in the same clock tick on the same payer do not collide.
    pub fn generate(payer: AccountId) -> Self {
        let backdate_ms: i64 = rand::thread_rng().gen_range(0..=5_000);
        Self {
            payer,
            valid_start: Utc::now() - ChronoDuration::milliseconds(backdate_ms),
            nonce: 0,
            scheduled: false,
        }
    }

    /// Creates an id with an explicit valid-start (primarily for tests and
    /// deterministic replay).
    pub fn with_valid_start(payer: AccountId, valid_start: DateTime<Utc>) -> Self {
        Self {
            payer,
            valid_start,
            nonce: 0,
            scheduled: false,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.payer,
            self.valid_start.timestamp(),
            self.valid_start.timestamp_subsec_nanos()
        )?;
        if self.scheduled {
            write!(f, "?scheduled")?;
        }
        if self.nonce != 0 {
            write!(f, "/{}", self.nonce)?;
        }
        Ok(())
    }
}

impl FromStr for TransactionId {
    type Err = ParseIdError;

    /// Parses the display form: `payer@seconds.nanos[?scheduled][/nonce]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseIdError::MalformedTransactionId(s.to_string());

        let (payer, rest) = s.split_once('@').ok_or_else(malformed)?;
        let payer: AccountId = payer.parse()?;

        let (rest, nonce) = match rest.rsplit_once('/') {
            Some((head, nonce)) => (head, nonce.parse::<u64>().map_err(|_| malformed())?),
            None => (rest, 0),
        };
        let (rest, scheduled) = match rest.strip_suffix("?scheduled") {
            Some(head) => (head, true),
            None => (rest, false),
        };

        let (secs, nanos) = rest.split_once('.').ok_or_else(malformed)?;
        let secs: i64 = secs.parse().map_err(|_| malformed())?;
        let nanos: u32 = nanos.parse().map_err(|_| malformed())?;
        let valid_start = DateTime::from_timestamp(secs, nanos).ok_or_else(malformed)?;

        Ok(Self {
            payer,
            valid_start,
            nonce,
            scheduled,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
