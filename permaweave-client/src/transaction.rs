//! Transaction assembly and signing
//!
//! A transaction is the signed, tagged envelope the network accepts:
//! a data root over the payload, an ordered tag list, and a signature
//! covering the canonical byte form of both. The transaction id is
//! content-derived (Blake3 of the signature), so it exists only after
//! signing and any mutation after signing invalidates the envelope.

use crate::error::{Result, UploadError};
use crate::signer::{Signature, Signer};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Required tag names; always present, unique by name
pub const TAG_CONTENT_TYPE: &str = "Content-Type";
pub const TAG_ENCRYPTED: &str = "Encrypted";

/// A (name, value) pair persisted on the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Content-derived transaction identifier
///
/// Base64url (unpadded) encoding of the Blake3 hash of the signature.
/// This is the durable receipt handed back to the caller.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Derive the id from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        let hash = blake3::hash(signature.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hash.as_bytes()))
    }

    /// Wrap an already-encoded id (e.g. parsed from CLI input)
    pub fn from_encoded(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The encoded id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", &self.0[..8.min(self.0.len())])
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed, tagged envelope referencing the full payload
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Content-derived identifier (assigned at signing)
    pub id: TransactionId,

    /// Tags in insertion order
    pub tags: Vec<Tag>,

    /// The full (possibly encrypted) payload
    pub data: Bytes,

    /// Blake3 hash of the payload, bound into the signature
    pub data_root: [u8; 32],

    /// Signature over the canonical envelope bytes
    pub signature: Signature,
}

impl Transaction {
    /// Payload size in bytes
    pub fn data_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Look up a tag value by name
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

/// Builds and signs transactions
///
/// The required tags (`Content-Type`, `Encrypted`) are always set from
/// the build arguments; additional tags are an open extension point and
/// may not shadow the required names.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    extra_tags: Vec<Tag>,
    allow_empty_payload: bool,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            extra_tags: Vec::new(),
            allow_empty_payload: false,
        }
    }

    /// Permit zero-length payloads (network policy dependent)
    pub fn allow_empty_payload(mut self, allow: bool) -> Self {
        self.allow_empty_payload = allow;
        self
    }

    /// Append an additional tag; required tag names are ignored here
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name != TAG_CONTENT_TYPE && name != TAG_ENCRYPTED {
            self.extra_tags.push(Tag::new(name, value));
        }
        self
    }

    /// Assemble the envelope and invoke the signer
    ///
    /// Fails fast with [`UploadError::EmptyData`] on an empty payload when
    /// empty payloads are disabled, and with [`UploadError::Signing`] when
    /// the signer rejects the request. No network I/O happens here.
    pub async fn build(
        &self,
        data: Bytes,
        mime_type: &str,
        encrypted: bool,
        signer: &dyn Signer,
    ) -> Result<Transaction> {
        if data.is_empty() && !self.allow_empty_payload {
            return Err(UploadError::EmptyData);
        }

        let mut tags = vec![
            Tag::new(TAG_CONTENT_TYPE, mime_type),
            Tag::new(TAG_ENCRYPTED, if encrypted { "true" } else { "false" }),
        ];
        tags.extend(self.extra_tags.iter().cloned());

        let data_root = *blake3::hash(&data).as_bytes();
        let message = canonical_bytes(&data_root, &tags);

        let signature = signer
            .sign(&message)
            .await
            .map_err(|e| UploadError::Signing(e.to_string()))?;
        let id = TransactionId::from_signature(&signature);

        Ok(Transaction {
            id,
            tags,
            data,
            data_root,
            signature,
        })
    }
}

/// Canonical byte representation of the unsigned envelope
///
/// Order is fixed by the network: data root first, then tags in insertion
/// order, every field prefixed with its u32 little-endian length.
fn canonical_bytes(data_root: &[u8; 32], tags: &[Tag]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + tags.len() * 32);
    push_field(&mut out, data_root);
    for tag in tags {
        push_field(&mut out, tag.name.as_bytes());
        push_field(&mut out, tag.value.as_bytes());
    }
    out
}

fn push_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_le_bytes());
    out.extend_from_slice(field);
}
