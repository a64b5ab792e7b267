//! Certificate verification and the trust store.
//!
//! A peer key enters the trust store only through [`verify_certificate`].
//! There is no way to construct a [`VerifiedCertificate`] from outside this
//! module, so holding one is proof that the authority signed it.

use std::collections::HashMap;

use certchat_crypto::{AuthorityPublicKey, PublicKey, SIGNATURE_SIZE, verify_signature};
use certchat_proto::{Certificate, Role};
use parking_lot::RwLock;

use crate::error::{MessengerError, Result};

/// A certificate whose authority signature has been checked, with its public
/// key imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCertificate {
    username: String,
    role: Role,
    public_key: PublicKey,
}

impl VerifiedCertificate {
    /// Username the key is bound to.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Registered role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Imported key-agreement public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Verify a certificate against the authority public key.
///
/// Checks, in order: required fields, signature shape, signature over the
/// canonical encoding, then imports the embedded key.
///
/// # Errors
///
/// - `InvalidCertificate` for missing fields or a malformed or wrong
///   signature
/// - `KeyImport` if a correctly signed certificate carries a key that cannot
///   be imported (unsupported curve, bad encoding)
pub fn verify_certificate(
    authority: &AuthorityPublicKey,
    certificate: &Certificate,
    signature: &[u8],
) -> Result<VerifiedCertificate> {
    certificate
        .check_required_fields()
        .map_err(|e| MessengerError::invalid_certificate(e.to_string()))?;

    if signature.len() != SIGNATURE_SIZE {
        return Err(MessengerError::invalid_certificate(format!(
            "malformed signature: expected {SIGNATURE_SIZE} bytes, got {}",
            signature.len()
        )));
    }

    let signed_bytes = certificate.canonical_bytes()?;
    if !verify_signature(authority, &signed_bytes, signature) {
        return Err(MessengerError::invalid_certificate("signature verification failed"));
    }

    let public_key = PublicKey::from_jwk(&certificate.public_key)?;

    Ok(VerifiedCertificate {
        username: certificate.username.clone(),
        role: certificate.role,
        public_key,
    })
}

/// Verified certificates by username.
///
/// # Invariants
///
/// - Every entry passed [`verify_certificate`]
/// - At most one entry per username; a later registration replaces the
///   earlier one
#[derive(Debug, Default)]
pub struct TrustStore {
    entries: RwLock<HashMap<String, VerifiedCertificate>>,
}

impl TrustStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a verified certificate, returning the one it replaced.
    pub fn insert(&self, certificate: VerifiedCertificate) -> Option<VerifiedCertificate> {
        self.entries.write().insert(certificate.username.clone(), certificate)
    }

    /// Look up a peer.
    pub fn get(&self, username: &str) -> Option<VerifiedCertificate> {
        self.entries.read().get(username).cloned()
    }

    /// Check if a peer is trusted.
    pub fn contains(&self, username: &str) -> bool {
        self.entries.read().contains_key(username)
    }

    /// Trusted usernames, sorted.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of trusted peers.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no peer is trusted.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
