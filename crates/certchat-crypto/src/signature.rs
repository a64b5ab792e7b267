//! Certificate authority signatures (Ed25519)

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Ed25519 signature size (64 bytes)
pub const SIGNATURE_SIZE: usize = 64;

/// Authority signing key. Lives only with the certificate authority.
pub struct AuthoritySigningKey {
    inner: SigningKey,
}

impl AuthoritySigningKey {
    /// Generate a fresh authority key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self { inner: SigningKey::generate(rng) }
    }

    /// Restore a key from its 32-byte seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let seed = <[u8; 32]>::try_from(bytes).map_err(|_| CryptoError::KeyImport {
            reason: format!("authority key must be 32 bytes, got {}", bytes.len()),
        })?;
        Ok(Self { inner: SigningKey::from_bytes(&seed) })
    }

    /// Export the 32-byte seed for offline storage.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.inner.to_bytes())
    }

    /// Public verification key to distribute to clients.
    pub fn public_key(&self) -> AuthorityPublicKey {
        AuthorityPublicKey { inner: self.inner.verifying_key() }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.inner.sign(message).to_bytes()
    }
}

impl fmt::Debug for AuthoritySigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthoritySigningKey([REDACTED])")
    }
}

/// Authority verification key, trusted by every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityPublicKey {
    inner: VerifyingKey,
}

impl AuthorityPublicKey {
    /// Import a 32-byte Ed25519 public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw = <[u8; 32]>::try_from(bytes).map_err(|_| CryptoError::KeyImport {
            reason: format!("authority public key must be 32 bytes, got {}", bytes.len()),
        })?;
        let inner = VerifyingKey::from_bytes(&raw).map_err(|err| CryptoError::KeyImport {
            reason: format!("invalid authority public key: {err}"),
        })?;
        Ok(Self { inner })
    }

    /// Raw public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }
}

/// Verify an authority signature.
///
/// Returns `false` for a malformed signature as well as a wrong one; the
/// caller only needs to know whether to trust the message.
pub fn verify_signature(authority: &AuthorityPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    authority.inner.verify_strict(message, &signature).is_ok()
}
