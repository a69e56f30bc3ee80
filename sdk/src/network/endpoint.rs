//! Network endpoints and node records.
//!
//! An [`Endpoint`] is where a node can be reached; a [`NodeRecord`] ties a
//! node identity to the account that currently owns routing to it and the
//! endpoints it answers on. Records are values — the topology refresher
//! publishes whole new ones rather than mutating records in place, which is
//! what lets in-flight submissions keep reading the snapshot they started
//! with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{AccountId, NodeId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing endpoint strings.
#[derive(Debug, Error)]
pub enum ParseEndpointError {
    /// The string has no `:port` suffix.
    #[error("endpoint {0:?} is missing a port")]
    MissingPort(String),

    /// The port suffix is not a valid u16.
    #[error("invalid port in endpoint {0:?}")]
    InvalidPort(String),

    /// The host part is empty.
    #[error("empty host in endpoint {0:?}")]
    EmptyHost(String),
}

// ---------------------------------------------------------------------------
// HostAddr / Endpoint
// ---------------------------------------------------------------------------

/// The host half of an endpoint: a DNS name or a raw IPv4 address.
///
/// The two are mutually exclusive by construction — this is a sum type, not
/// a pair of optional fields with a "exactly one is set" convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostAddr {
    /// A DNS name, resolved by the transport at dial time.
    Domain(String),
    /// A raw IPv4 address.
    Ipv4([u8; 4]),
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAddr::Domain(d) => write!(f, "{d}"),
            HostAddr::Ipv4([a, b, c, d]) => write!(f, "{a}.{b}.{c}.{d}"),
        }
    }
}

/// A reachable network address: host plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// DNS name or IPv4 address.
    pub addr: HostAddr,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// An endpoint with a DNS-name host.
    pub fn domain(name: impl Into<String>, port: u16) -> Self {
        Self {
            addr: HostAddr::Domain(name.into()),
            port,
        }
    }

    /// An endpoint with a raw IPv4 host.
    pub fn ipv4(octets: [u8; 4], port: u16) -> Self {
        Self {
            addr: HostAddr::Ipv4(octets),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    /// Parses `host:port`. A host of four dot-separated octets becomes
    /// [`HostAddr::Ipv4`]; anything else is a domain name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseEndpointError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(ParseEndpointError::EmptyHost(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ParseEndpointError::InvalidPort(s.to_string()))?;

        let octets: Vec<Option<u8>> = host.split('.').map(|p| p.parse().ok()).collect();
        if octets.len() == 4 && octets.iter().all(Option::is_some) {
            let mut ip = [0u8; 4];
            for (slot, octet) in ip.iter_mut().zip(octets) {
                *slot = octet.unwrap();
            }
            return Ok(Endpoint::ipv4(ip, port));
        }
        Ok(Endpoint::domain(host, port))
    }
}

// ---------------------------------------------------------------------------
// NodeRecord
// ---------------------------------------------------------------------------

/// Everything the client knows about one consensus node.
///
/// Created and replaced wholesale by the topology refresher; read (never
/// written) by the submission coordinator and the receipt poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The node's stable identity.
    pub node_id: NodeId,
    /// The account that currently owns routing to this node. This is the
    /// field that goes stale when the network reshuffles.
    pub account_id: AccountId,
    /// Endpoints the node answers on, in preference order.
    pub endpoints: Vec<Endpoint>,
    /// SHA-384 hash of the node's TLS certificate, when published.
    pub cert_hash: Option<Vec<u8>>,
}

impl NodeRecord {
    /// A record with a single endpoint and no certificate hash.
    pub fn new(node_id: NodeId, account_id: AccountId, endpoint: Endpoint) -> Self {
        Self {
            node_id,
            account_id,
            endpoints: vec![endpoint],
            cert_hash: None,
        }
    }

    /// The preferred endpoint, if the record has any at all.
    pub fn primary_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.first()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
