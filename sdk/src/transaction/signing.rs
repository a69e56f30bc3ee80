//! Ed25519 keys and detached transaction signing.
//!
//! Signing is separate from building because key material may not be on
//! hand at construction time (hardware signer, remote KMS, multi-party
//! flows). Signatures cover [`TransactionBody::canonical_bytes`] only —
//! never the routing envelope — so a retry against a different node needs
//! no re-signing.
//!
//! [`TransactionBody::canonical_bytes`]: crate::transaction::types::TransactionBody::canonical_bytes

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::builder::Transaction;

/// Errors produced while handling key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The input is not valid hex or has the wrong length.
    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),

    /// The bytes do not form a valid curve point.
    #[error("invalid public key bytes")]
    InvalidPoint,
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// An Ed25519 public key, stored as its 32 compressed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Hex encoding of the compressed key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidEncoding("expected 32 bytes".to_string()))?;
        Ok(PublicKey(arr))
    }

    /// Verifies `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &sig).is_ok()
    }
}

/// An Ed25519 signing key.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a fresh key from the OS entropy source.
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Reconstructs a key from its 32 secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(SigningKey::from_bytes(&bytes))
    }

    /// Parses a hex-encoded secret key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidEncoding("expected 32 bytes".to_string()))?;
        Ok(Self::from_bytes(arr))
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// The 32 secret bytes, for writing to a key file. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Signs `message`, returning the 64 signature bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.0.sign(message).to_bytes().to_vec()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material, even at debug level.
        write!(f, "PrivateKey({})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// SignaturePair
// ---------------------------------------------------------------------------

/// One signature over the transaction body, with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    /// The signer's public key.
    pub public_key: PublicKey,
    /// 64-byte Ed25519 signature over the canonical body bytes.
    pub signature: Vec<u8>,
}

impl SignaturePair {
    /// Verifies this pair against the body bytes it claims to sign.
    pub fn verify(&self, body_bytes: &[u8]) -> bool {
        self.public_key.verify(body_bytes, &self.signature)
    }
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Signs a transaction in place with `key`.
///
/// Signing the same transaction twice with the same key replaces the old
/// pair rather than appending a duplicate. The transaction id and body
/// bytes are untouched — signing never changes what is signed.
pub fn sign_transaction<'a>(tx: &'a mut Transaction, key: &PrivateKey) -> &'a Transaction {
    let public_key = key.public_key();
    let signature = key.sign(tx.body_bytes());
    tx.signatures.retain(|p| p.public_key != public_key);
    tx.signatures.push(SignaturePair {
        public_key,
        signature,
    });
    tx
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AccountId;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::types::{Operation, Transfer};

    fn sample_transaction() -> Transaction {
        TransactionBuilder::new(Operation::Transfer {
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
        })
        .payer(AccountId::from_num(2))
        .build()
        .unwrap()
    }

    #[test]
    fn key_hex_roundtrip() {
        let key = PrivateKey::generate();
        let public = key.public_key();
        assert_eq!(PublicKey::from_hex(&public.to_hex()).unwrap(), public);
        assert!(PublicKey::from_hex("zz").is_err());
        assert!(PublicKey::from_hex("abcd").is_err());

        let restored = PrivateKey::from_bytes(key.secret_bytes());
        assert_eq!(restored.public_key(), public);
    }

    #[test]
    fn sign_and_verify() {
        let key = PrivateKey::generate();
        let mut tx = sample_transaction();
        sign_transaction(&mut tx, &key);

        let pair = &tx.signatures[0];
        assert_eq!(pair.signature.len(), 64);
        assert!(pair.verify(tx.body_bytes()));
        assert!(!pair.verify(b"different message"));
    }

    #[test]
    fn signing_does_not_change_id_or_body() {
        let key = PrivateKey::generate();
        let mut tx = sample_transaction();
        let id_before = tx.id().clone();
        let bytes_before = tx.body_bytes().to_vec();

        sign_transaction(&mut tx, &key);

        assert_eq!(tx.id(), &id_before, "signing must not change the id");
        assert_eq!(tx.body_bytes(), &bytes_before[..]);
    }

    #[test]
    fn re_signing_with_same_key_does_not_duplicate() {
        let key = PrivateKey::generate();
        let mut tx = sample_transaction();
        sign_transaction(&mut tx, &key);
        sign_transaction(&mut tx, &key);
        assert_eq!(tx.signatures.len(), 1);
    }

    #[test]
    fn multiple_signers_accumulate() {
        let a = PrivateKey::generate();
        let b = PrivateKey::generate();
        let mut tx = sample_transaction();
        sign_transaction(&mut tx, &a);
        sign_transaction(&mut tx, &b);
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.signatures.iter().all(|p| p.verify(tx.body_bytes())));
    }

    #[test]
    fn private_key_debug_hides_secret() {
        let key = PrivateKey::from_bytes([7u8; 32]);
        let debug = format!("{key:?}");
        assert!(!debug.contains(&hex::encode([7u8; 32])));
        assert!(debug.contains(&key.public_key().to_hex()));
    }
}
