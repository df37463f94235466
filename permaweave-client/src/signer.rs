//! Signing capability
//!
//! Signing is an external collaborator from the pipeline's point of view:
//! the session never touches key material, it only hands canonical bytes
//! to a [`Signer`]. An Ed25519 implementation is bundled for callers that
//! hold a raw identity key.

use bytes::Bytes;
use ed25519_dalek::Signer as DalekSigner;
use ed25519_dalek::SigningKey;
use std::fmt;
use thiserror::Error;

/// Signing operation errors
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("no signing identity configured")]
    NoIdentity,

    #[error("signing rejected: {0}")]
    Rejected(String),
}

/// A detached signature over the canonical transaction bytes
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Bytes);

impl Signature {
    /// Wrap raw signature bytes
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// External signing capability
///
/// `sign` is a suspension point: hardware tokens and remote wallets are
/// slow, so implementations may block or await freely.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Sign the canonical byte representation of a transaction envelope
    async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError>;

    /// Public key of the signing identity, if the signer exposes one
    fn public_key(&self) -> Option<Bytes>;
}

/// In-process Ed25519 signer backed by a raw 32-byte identity key
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a new random signing identity
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a raw 32-byte secret key
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(bytes),
        }
    }

    /// Raw secret key bytes (for persisting the identity)
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signer([REDACTED])")
    }
}

#[async_trait::async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let sig = self.key.sign(message);
        Ok(Signature::from_bytes(sig.to_bytes().to_vec()))
    }

    fn public_key(&self) -> Option<Bytes> {
        Some(Bytes::copy_from_slice(
            self.key.verifying_key().as_bytes(),
        ))
    }
}
