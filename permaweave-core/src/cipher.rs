//! Counter-mode cipher engine
//!
//! Provides:
//! - AES-256-CTR stream encryption/decryption (no padding, no length change)
//! - Fixed-length key handling with zeroize-on-drop
//! - Explicit 128-bit counter base, generated fresh per upload
//!
//! The counter base must never be reused with the same key for two
//! different plaintexts. That is a caller precondition: generate a fresh
//! `CounterBase` per file via [`CounterBase::generate`]. Keys are raw
//! 32-byte values from an external provisioner; there is deliberately no
//! passphrase-to-key entry point in this crate.

use crate::error::{CoreError, Result};
use crate::{COUNTER_SIZE, KEY_SIZE};
use aes::Aes256;
use bytes::Bytes;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// AES-256 in CTR mode with a big-endian 128-bit block counter
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// AES-256 encryption key
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a new random encryption key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != KEY_SIZE {
            return Err(CoreError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self(key))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        // Zeroize key on drop for security
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// 128-bit initial counter value for CTR mode
///
/// The keystream for block `i` is `AES(key, counter_base + i)`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterBase([u8; COUNTER_SIZE]);

impl CounterBase {
    /// Generate a fresh random counter base
    pub fn generate() -> Self {
        let mut counter = [0u8; COUNTER_SIZE];
        OsRng.fill_bytes(&mut counter);
        Self(counter)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; COUNTER_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != COUNTER_SIZE {
            return Err(CoreError::InvalidCounterLength {
                expected: COUNTER_SIZE,
                actual: slice.len(),
            });
        }
        let mut counter = [0u8; COUNTER_SIZE];
        counter.copy_from_slice(slice);
        Ok(Self(counter))
    }

    /// Get the raw counter bytes
    pub fn as_bytes(&self) -> &[u8; COUNTER_SIZE] {
        &self.0
    }

    /// Convert to hex string (for display alongside a receipt)
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for CounterBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CounterBase({})", &self.to_hex()[..8])
    }
}

/// Encrypted buffer together with the counter base that produced it
///
/// Invariant: `bytes.len()` equals the plaintext length (stream cipher,
/// no padding).
#[derive(Debug, Clone)]
pub struct Ciphertext {
    /// Ciphertext bytes
    pub bytes: Bytes,
    /// Counter base used for encryption; required for decryption
    pub counter_base: CounterBase,
}

impl Ciphertext {
    /// Length of the ciphertext in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encrypt a buffer using AES-256-CTR
///
/// The returned ciphertext has the same length as the plaintext. The
/// final partial block uses only the leading bytes of its keystream block.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey, counter_base: CounterBase) -> Ciphertext {
    let mut buf = plaintext.to_vec();
    apply_keystream(&mut buf, key, counter_base);
    Ciphertext {
        bytes: Bytes::from(buf),
        counter_base,
    }
}

/// Decrypt a buffer using AES-256-CTR
///
/// CTR mode is symmetric: decryption is the same keystream XOR given the
/// same key and counter base.
pub fn decrypt(ciphertext: &[u8], key: &EncryptionKey, counter_base: CounterBase) -> Bytes {
    let mut buf = ciphertext.to_vec();
    apply_keystream(&mut buf, key, counter_base);
    Bytes::from(buf)
}

fn apply_keystream(buf: &mut [u8], key: &EncryptionKey, counter_base: CounterBase) {
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), counter_base.as_bytes().into());
    cipher.apply_keystream(buf);
}
