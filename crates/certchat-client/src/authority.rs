//! Certificate authority.
//!
//! Signs the canonical encoding of certificates. Clients only ever hold the
//! authority's public key; the signing side lives here so that bootstrap
//! tooling and tests can issue certificates.

use certchat_crypto::{AuthorityPublicKey, AuthoritySigningKey};
use certchat_proto::{Certificate, SignedCertificate};
use rand::{CryptoRng, RngCore};

use crate::error::{MessengerError, Result};

/// Certificate authority holding the signing key.
#[derive(Debug)]
pub struct CertificateAuthority {
    signing_key: AuthoritySigningKey,
}

impl CertificateAuthority {
    /// Create an authority with a fresh signing key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self { signing_key: AuthoritySigningKey::generate(rng) }
    }

    /// Create an authority from an existing signing key.
    pub fn from_signing_key(signing_key: AuthoritySigningKey) -> Self {
        Self { signing_key }
    }

    /// Signing key, for export by bootstrap tooling.
    pub fn signing_key(&self) -> &AuthoritySigningKey {
        &self.signing_key
    }

    /// Public key to hand to every client.
    pub fn public_key(&self) -> AuthorityPublicKey {
        self.signing_key.public_key()
    }

    /// Sign a certificate.
    ///
    /// # Errors
    ///
    /// - `InvalidCertificate` if a required field is missing; the authority
    ///   never signs a certificate that clients would reject
    pub fn sign(&self, certificate: Certificate) -> Result<SignedCertificate> {
        certificate
            .check_required_fields()
            .map_err(|e| MessengerError::invalid_certificate(e.to_string()))?;

        let signature = self.signing_key.sign(&certificate.canonical_bytes()?).to_vec();

        tracing::debug!(
            username = %certificate.username,
            role = %certificate.role,
            "issued certificate"
        );

        Ok(SignedCertificate { certificate, signature })
    }
}
