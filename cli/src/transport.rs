//! # Framed TCP Transport
//!
//! The wire layer the CLI dials nodes with: one TCP connection per request,
//! length-prefixed bincode frames, request out, response back, done. No
//! connection pooling — a command-line tool submits one transaction and
//! exits, so the simplest thing that works is the right thing.
//!
//! The same framing carries mirror lookups: [`TcpMirror`] asks a mirror
//! endpoint for the current address book over an identical connection.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use meridian_sdk::codec::{BincodeCodec, Codec};
use meridian_sdk::entity::TransactionId;
use meridian_sdk::network::endpoint::{Endpoint, NodeRecord};
use meridian_sdk::network::topology::{MirrorError, MirrorSource};
use meridian_sdk::transport::{
    ReceiptResponse, SubmitAck, SubmitEnvelope, Transport, TransportError,
};

/// Upper bound on a response frame. Anything larger is a protocol error,
/// not a legitimate answer to a single submission or receipt query.
const MAX_FRAME_BYTES: u32 = 4 * 1024 * 1024;

/// Per-connection dial-plus-roundtrip timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire messages
// ---------------------------------------------------------------------------

/// The request frame. The node answers with the payload matching the
/// variant: [`SubmitAck`], [`ReceiptResponse`], or `Vec<NodeRecord>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Submit a signed transaction.
    Submit(SubmitEnvelope),
    /// Ask for the outcome of a transaction.
    Receipt(TransactionId),
    /// Ask a mirror for the current address book.
    AddressBook,
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// One-shot framed TCP connections to consensus nodes.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    codec: BincodeCodec,
}

impl TcpTransport {
    /// A transport with the default codec and timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dials `endpoint`, sends one frame, reads one frame back.
    async fn roundtrip<R: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        request: &Request,
    ) -> Result<R, TransportError> {
        let payload = self
            .codec
            .encode(request)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        timeout(REQUEST_TIMEOUT, async {
            let addr = endpoint.to_string();
            let mut stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| TransportError::Unreachable(format!("{addr}: {e}")))?;
            debug!(endpoint = %addr, bytes = payload.len(), "request frame out");

            stream
                .write_all(&(payload.len() as u32).to_be_bytes())
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;
            stream
                .write_all(&payload)
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;

            let mut len_bytes = [0u8; 4];
            stream
                .read_exact(&mut len_bytes)
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;
            let len = u32::from_be_bytes(len_bytes);
            if len > MAX_FRAME_BYTES {
                return Err(TransportError::Protocol(format!(
                    "response frame of {len} bytes exceeds limit"
                )));
            }

            let mut body = vec![0u8; len as usize];
            stream
                .read_exact(&mut body)
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;
            debug!(endpoint = %addr, bytes = len, "response frame in");

            self.codec
                .decode(&body)
                .map_err(|e| TransportError::Protocol(e.to_string()))
        })
        .await
        .map_err(|_| TransportError::Timeout)?
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn submit(
        &self,
        endpoint: &Endpoint,
        envelope: &SubmitEnvelope,
    ) -> Result<SubmitAck, TransportError> {
        self.roundtrip(endpoint, &Request::Submit(envelope.clone()))
            .await
    }

    async fn query_receipt(
        &self,
        endpoint: &Endpoint,
        transaction_id: &TransactionId,
    ) -> Result<ReceiptResponse, TransportError> {
        self.roundtrip(endpoint, &Request::Receipt(transaction_id.clone()))
            .await
    }
}

// ---------------------------------------------------------------------------
// TcpMirror
// ---------------------------------------------------------------------------

/// A mirror source speaking the same framed protocol against one endpoint.
pub struct TcpMirror {
    endpoint: Endpoint,
    transport: TcpTransport,
}

impl TcpMirror {
    /// A mirror client for the given endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            transport: TcpTransport::new(),
        }
    }
}

#[async_trait]
impl MirrorSource for TcpMirror {
    async fn fetch_nodes(&self) -> Result<Vec<NodeRecord>, MirrorError> {
        self.transport
            .roundtrip::<Vec<NodeRecord>>(&self.endpoint, &Request::AddressBook)
            .await
            .map_err(|e| match e {
                TransportError::Protocol(msg) => MirrorError::Malformed(msg),
                other => MirrorError::Unreachable(other.to_string()),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
