//! # Wire Codec Boundary
//!
//! Transports need bytes; the SDK speaks typed envelopes. The [`Codec`]
//! trait is the seam between the two. Field numbering, framing, and
//! wire-format compatibility are the codec implementation's problem — the
//! routing and retry machinery treats encoded messages as opaque.
//!
//! [`BincodeCodec`] is the default: compact, deterministic for a fixed type
//! definition, and already part of this workspace's serialization stack.
//! Deployments speaking a different wire protocol drop in their own `Codec`.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors crossing the codec boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Incoming bytes could not be decoded as the expected message type.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Encodes and decodes protocol messages.
///
/// Implementations must be deterministic: encoding the same value twice
/// yields the same bytes, since submission retries re-encode the same
/// envelope and rely on it being bit-identical apart from the target node.
pub trait Codec: Send + Sync {
    /// Encodes a message to wire bytes.
    fn encode<M: Serialize>(&self, message: &M) -> Result<Bytes, CodecError>;

    /// Decodes wire bytes into a message.
    fn decode<M: DeserializeOwned>(&self, bytes: &[u8]) -> Result<M, CodecError>;
}

/// The workspace-default codec, backed by bincode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<M: Serialize>(&self, message: &M) -> Result<Bytes, CodecError> {
        bincode::serialize(message)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<M: DeserializeOwned>(&self, bytes: &[u8]) -> Result<M, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
