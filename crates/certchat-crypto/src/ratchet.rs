//! Symmetric Ratchet for forward-secure message key derivation
//!
//! # Security Properties
//!
//! - Forward Secrecy: Old chain keys are zeroized when a step is committed
//! - Key Uniqueness: Each generation produces a unique message key
//! - Determinism: Same root key always produces same key sequence
//! - Atomicity: A step is prepared without touching the ratchet and only
//!   committed once the caller's AEAD operation succeeded

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    kdf::{KEY_SIZE, hkdf_expand, hmac},
    keys::SharedSecret,
};

/// Label for deriving the root key from the ECDH output
const INIT_LABEL: &[u8] = b"init";

/// HKDF info for splitting the root key into two chains
const SPLIT_INFO: &[u8] = b"ratchet-str";

/// Label for deriving a message key
const MESSAGE_LABEL: &[u8] = b"message-key";

/// Label for deriving the next chain key
const CHAIN_LABEL: &[u8] = b"ratchet";

/// Root key of a session, derived once from the ECDH shared secret.
pub struct RootKey {
    key: [u8; KEY_SIZE],
}

impl RootKey {
    /// `HMAC(shared_secret, "init")`.
    pub fn from_shared_secret(shared: &SharedSecret) -> Self {
        Self { key: hmac(shared.as_bytes(), INIT_LABEL) }
    }

    pub(crate) fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Split into two independent chain keys, one per direction.
    ///
    /// Both parties compute the same pair; which one is used for sending is
    /// decided by the caller.
    pub fn split(&self) -> (ChainKey, ChainKey) {
        let (first, second) = hkdf_expand(&self.key, &self.key, SPLIT_INFO);
        (ChainKey { key: *first }, ChainKey { key: *second })
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootKey([REDACTED])")
    }
}

impl Drop for RootKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Chain key: only ever used to derive one message key and its successor.
pub struct ChainKey {
    key: [u8; KEY_SIZE],
}

impl ChainKey {
    /// Start a chain from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; KEY_SIZE]) -> Self {
        Self { key: *seed }
    }

    fn derive_message_key(&self) -> [u8; KEY_SIZE] {
        hmac(&self.key, MESSAGE_LABEL)
    }

    fn derive_next(&self) -> Self {
        Self { key: hmac(&self.key, CHAIN_LABEL) }
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChainKey([REDACTED])")
    }
}

impl Drop for ChainKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// A message key derived from the ratchet.
///
/// This key is used for a single message encryption/decryption.
/// It should be used immediately and then discarded.
pub struct MessageKey {
    /// The 32-byte symmetric key for ChaCha20-Poly1305
    key: [u8; KEY_SIZE],
    /// The generation (ratchet step) this key was derived from
    generation: u64,
}

impl MessageKey {
    /// 32-byte symmetric key for ChaCha20-Poly1305 AEAD.
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Ratchet generation this key was derived from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl PartialEq for MessageKey {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && bool::from(self.key.ct_eq(&other.key))
    }
}

impl Eq for MessageKey {}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageKey").field("generation", &self.generation).finish_non_exhaustive()
    }
}

impl Drop for MessageKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// A derived but not yet committed ratchet step.
///
/// Holds the message key for the current generation and the chain key that
/// will replace the current one. Dropping it without committing leaves the
/// ratchet exactly where it was.
#[derive(Debug)]
pub struct PendingStep {
    message_key: MessageKey,
    next_chain_key: ChainKey,
}

impl PendingStep {
    /// Message key for this step.
    pub fn message_key(&self) -> &MessageKey {
        &self.message_key
    }

    /// Generation this step belongs to.
    pub fn generation(&self) -> u64 {
        self.message_key.generation
    }
}

/// Forward-secure symmetric ratchet.
///
/// Derives a sequence of message keys from an initial chain key. Each
/// committed step:
/// 1. Derives a message key from the current chain key
/// 2. Derives the next chain key
/// 3. Overwrites the old chain key (forward secrecy)
///
/// There is no way back: a chain key is `HMAC(previous, "ratchet")` and the
/// previous value is zeroized on commit.
pub struct SymmetricRatchet {
    /// Current chain key (32 bytes)
    chain_key: ChainKey,
    /// Current generation (number of committed steps)
    generation: u64,
}

impl SymmetricRatchet {
    /// Create a new ratchet at generation 0.
    pub fn new(chain_key: ChainKey) -> Self {
        Self { chain_key, generation: 0 }
    }

    /// Resume a ratchet whose chain key is already at `generation`.
    pub fn resume(chain_key: ChainKey, generation: u64) -> Self {
        Self { chain_key, generation }
    }

    /// Current generation number.
    ///
    /// This is the number of steps committed so far, and the generation of
    /// the next message key.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Derive the next step without changing the ratchet.
    pub fn prepare(&self) -> Result<PendingStep, CryptoError> {
        if self.generation == u64::MAX {
            return Err(CryptoError::GenerationOverflow { current: self.generation });
        }

        Ok(PendingStep {
            message_key: MessageKey {
                key: self.chain_key.derive_message_key(),
                generation: self.generation,
            },
            next_chain_key: self.chain_key.derive_next(),
        })
    }

    /// Apply a prepared step: replace (and zeroize) the chain key and
    /// increment the generation.
    ///
    /// # Errors
    ///
    /// - `StaleStep` if the step was prepared at another generation
    pub fn commit(&mut self, step: PendingStep) -> Result<(), CryptoError> {
        if step.generation() != self.generation {
            return Err(CryptoError::StaleStep {
                current: self.generation,
                step: step.generation(),
            });
        }

        let PendingStep { message_key, next_chain_key } = step;
        drop(message_key);

        // Old chain key is zeroized by its Drop
        self.chain_key = next_chain_key;
        self.generation += 1;

        Ok(())
    }

    /// Prepare and immediately commit, returning the message key.
    pub fn advance(&mut self) -> Result<MessageKey, CryptoError> {
        let PendingStep { message_key, next_chain_key } = self.prepare()?;

        self.chain_key = next_chain_key;
        self.generation += 1;

        Ok(message_key)
    }
}

impl fmt::Debug for SymmetricRatchet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricRatchet")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
