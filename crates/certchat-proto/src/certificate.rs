//! Identity certificates.
//!
//! A certificate binds a username and role to a key-agreement public key.
//! The authority signs the canonical CBOR encoding of the certificate; CBOR
//! with struct fields in declaration order gives the signer and every
//! verifier the same bytes.
//!
//! Certificates are plain values. Nothing here verifies anything: a
//! `Certificate` may be forged or incomplete until the client's trust store
//! has checked it.

use std::fmt;

use certchat_crypto::{JwkPublicKey, PublicKey};
use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Maximum accepted size of a certificate in JSON form (64 KiB)
pub const MAX_CERTIFICATE_JSON: usize = 64 * 1024;

/// Role a party registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Party that initiates conversations
    Sender,
    /// Party that receives conversations
    Recipient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Recipient => f.write_str("recipient"),
        }
    }
}

/// Unsigned certificate body.
///
/// # Invariants
///
/// - Field order is part of the signed encoding and must never change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Username the key is bound to
    #[serde(default)]
    pub username: String,

    /// Registered role
    pub role: Role,

    /// Key-agreement public key
    #[serde(default)]
    pub public_key: JwkPublicKey,
}

impl Certificate {
    /// Build a certificate for a public key.
    pub fn new(username: impl Into<String>, role: Role, public_key: &PublicKey) -> Self {
        Self { username: username.into(), role, public_key: public_key.to_jwk() }
    }

    /// Check that every field needed for verification is present.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingField` naming the first empty field
    pub fn check_required_fields(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(ProtocolError::MissingField("username"));
        }
        if self.public_key.x.is_empty() {
            return Err(ProtocolError::MissingField("public_key.x"));
        }
        if self.public_key.kty.is_empty() {
            return Err(ProtocolError::MissingField("public_key.kty"));
        }
        if self.public_key.crv.is_empty() {
            return Err(ProtocolError::MissingField("public_key.crv"));
        }
        Ok(())
    }

    /// Canonical encoding covered by the authority signature.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(self, &mut encoded)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(encoded)
    }
}

/// Certificate plus the authority signature, as exchanged over transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCertificate {
    /// Certificate body
    pub certificate: Certificate,

    /// Authority signature over [`Certificate::canonical_bytes`], base64
    #[serde(with = "crate::b64::bytes")]
    pub signature: Vec<u8>,
}

impl SignedCertificate {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooLarge` if the input exceeds
    ///   [`MAX_CERTIFICATE_JSON`]; checked before parsing
    /// - `ProtocolError::Json` if the input is not a signed certificate
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > MAX_CERTIFICATE_JSON {
            return Err(ProtocolError::TooLarge { size: json.len(), max: MAX_CERTIFICATE_JSON });
        }
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use certchat_crypto::Keypair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn certificate(username: &str) -> Certificate {
        let keypair = Keypair::generate(&mut ChaCha20Rng::seed_from_u64(1));
        Certificate::new(username, Role::Sender, keypair.public())
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let cert = certificate("alice");
        assert_eq!(cert.canonical_bytes().unwrap(), cert.clone().canonical_bytes().unwrap());
    }

    #[test]
    fn canonical_bytes_cover_every_field() {
        let base = certificate("alice");

        let mut renamed = base.clone();
        renamed.username = "mallory".to_string();

        let mut role_changed = base.clone();
        role_changed.role = Role::Recipient;

        let mut rekeyed = base.clone();
        rekeyed.public_key.x = "AAAA".to_string();

        let bytes = base.canonical_bytes().unwrap();
        assert_ne!(bytes, renamed.canonical_bytes().unwrap());
        assert_ne!(bytes, role_changed.canonical_bytes().unwrap());
        assert_ne!(bytes, rekeyed.canonical_bytes().unwrap());
    }

    #[test]
    fn required_fields_are_checked() {
        assert_eq!(certificate("alice").check_required_fields(), Ok(()));

        let mut cert = certificate("");
        assert_eq!(cert.check_required_fields(), Err(ProtocolError::MissingField("username")));

        cert.username = "alice".to_string();
        cert.public_key.crv.clear();
        assert_eq!(
            cert.check_required_fields(),
            Err(ProtocolError::MissingField("public_key.crv"))
        );
    }

    #[test]
    fn json_without_public_key_decodes_as_missing() {
        let json = r#"{"certificate":{"username":"alice","role":"sender"},"signature":""}"#;
        let signed = SignedCertificate::from_json(json).unwrap();
        assert_eq!(
            signed.certificate.check_required_fields(),
            Err(ProtocolError::MissingField("public_key.x"))
        );
    }

    #[test]
    fn role_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Recipient).unwrap();
        assert_eq!(json, r#""recipient""#);
        assert_eq!(Role::Sender.to_string(), "sender");
    }

    #[test]
    fn signed_certificate_json_roundtrip() {
        let signed = SignedCertificate { certificate: certificate("bob"), signature: vec![9; 64] };
        let decoded = SignedCertificate::from_json(&signed.to_json().unwrap()).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn oversized_json_is_rejected_before_parsing() {
        let json = " ".repeat(MAX_CERTIFICATE_JSON + 1);
        assert!(matches!(SignedCertificate::from_json(&json), Err(ProtocolError::TooLarge { .. })));
    }
}
