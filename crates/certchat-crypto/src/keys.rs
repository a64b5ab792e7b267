//! Key-agreement keys and their JWK export form
//!
//! Keys are typed handles tagged with their curve. The only raw export is
//! the public half (as a JWK-shaped record for certificates), plus an
//! explicit keypair export used by offline bootstrap tooling.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

/// Size of an X25519 key in bytes
const X25519_KEY_SIZE: usize = 32;

/// Elliptic curve a key-agreement key lives on.
///
/// The tag travels with every exported key and is checked on import; it is
/// never inferred from the key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    /// Curve25519 Diffie-Hellman (RFC 7748)
    X25519,
}

impl Curve {
    /// JWK `kty` value for keys on this curve.
    pub const fn jwk_kty(self) -> &'static str {
        match self {
            Self::X25519 => "OKP",
        }
    }

    /// JWK `crv` value for keys on this curve.
    pub const fn jwk_crv(self) -> &'static str {
        match self {
            Self::X25519 => "X25519",
        }
    }

    /// Resolve a curve from explicit JWK tags.
    pub fn from_jwk(kty: &str, crv: &str) -> Result<Self, CryptoError> {
        match (kty, crv) {
            ("OKP", "X25519") => Ok(Self::X25519),
            ("", _) => Err(CryptoError::key_import("missing key type")),
            (_, "") => Err(CryptoError::key_import("missing curve parameters")),
            (kty, crv) => {
                Err(CryptoError::key_import(format!("unsupported key type {kty} on curve {crv}")))
            },
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwk_crv())
    }
}

/// JWK-shaped export of a public key-agreement key.
///
/// Field order is fixed; certificates embed this record and are signed over
/// their canonical encoding. Absent fields decode as empty strings so that
/// import can report which one is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwkPublicKey {
    /// Key type (`OKP` for X25519)
    pub kty: String,
    /// Curve name
    pub crv: String,
    /// Public key bytes, base64url without padding
    pub x: String,
}

/// JWK-shaped export of a full keypair, for offline bootstrap files only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkKeypair {
    /// Key type (`OKP` for X25519)
    pub kty: String,
    /// Curve name
    pub crv: String,
    /// Public key bytes, base64url without padding
    pub x: String,
    /// Private key bytes, base64url without padding
    pub d: String,
}

impl fmt::Debug for JwkKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwkKeypair")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .finish_non_exhaustive()
    }
}

impl Drop for JwkKeypair {
    fn drop(&mut self) {
        self.d.zeroize();
    }
}

/// A certified or certifiable public key-agreement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    curve: Curve,
    key: x25519_dalek::PublicKey,
}

impl PublicKey {
    /// Curve this key belongs to.
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        self.key.as_bytes()
    }

    /// Import raw public key bytes for an explicitly named curve.
    pub fn from_bytes(curve: Curve, bytes: &[u8]) -> Result<Self, CryptoError> {
        match curve {
            Curve::X25519 => {
                let raw = fixed_bytes(bytes, "public key")?;
                Ok(Self { curve, key: x25519_dalek::PublicKey::from(raw) })
            },
        }
    }

    /// Export as a JWK-shaped record.
    pub fn to_jwk(&self) -> JwkPublicKey {
        JwkPublicKey {
            kty: self.curve.jwk_kty().to_string(),
            crv: self.curve.jwk_crv().to_string(),
            x: URL_SAFE_NO_PAD.encode(self.as_bytes()),
        }
    }

    /// Import from a JWK-shaped record, checking `kty` and `crv` first.
    pub fn from_jwk(jwk: &JwkPublicKey) -> Result<Self, CryptoError> {
        let curve = Curve::from_jwk(&jwk.kty, &jwk.crv)?;
        if jwk.x.is_empty() {
            return Err(CryptoError::key_import("missing public key"));
        }
        let bytes = decode_b64url(&jwk.x, "public key")?;
        Self::from_bytes(curve, &bytes)
    }
}

/// Private key-agreement key. Never exported except via [`Keypair::to_jwk`].
pub struct SecretKey {
    curve: Curve,
    secret: StaticSecret,
}

impl SecretKey {
    /// Curve this key belongs to.
    pub fn curve(&self) -> Curve {
        self.curve
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({}, [REDACTED])", self.curve)
    }
}

/// Long-term identity keypair.
#[derive(Debug)]
pub struct Keypair {
    public: PublicKey,
    secret: SecretKey,
}

impl Keypair {
    /// Generate a fresh X25519 keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(StaticSecret::random_from_rng(&mut *rng))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = x25519_dalek::PublicKey::from(&secret);
        Self {
            public: PublicKey { curve: Curve::X25519, key: public },
            secret: SecretKey { curve: Curve::X25519, secret },
        }
    }

    /// Public half.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Private half.
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Export both halves. Intended for key bootstrap files, never for the
    /// wire.
    pub fn to_jwk(&self) -> JwkKeypair {
        let public = self.public.to_jwk();
        let secret_bytes = Zeroizing::new(self.secret.secret.to_bytes());
        JwkKeypair {
            kty: public.kty.clone(),
            crv: public.crv.clone(),
            x: public.x.clone(),
            d: URL_SAFE_NO_PAD.encode(secret_bytes.as_slice()),
        }
    }

    /// Import a keypair export, checking that `x` matches `d`.
    pub fn from_jwk(jwk: &JwkKeypair) -> Result<Self, CryptoError> {
        match Curve::from_jwk(&jwk.kty, &jwk.crv)? {
            Curve::X25519 => {
                let bytes = Zeroizing::new(decode_b64url(&jwk.d, "private key")?);
                let raw = Zeroizing::new(fixed_bytes(&bytes, "private key")?);
                let keypair = Self::from_secret(StaticSecret::from(*raw));

                let claimed = PublicKey::from_jwk(&JwkPublicKey {
                    kty: jwk.kty.clone(),
                    crv: jwk.crv.clone(),
                    x: jwk.x.clone(),
                })?;
                if claimed != keypair.public {
                    return Err(CryptoError::key_import("public key does not match private key"));
                }
                Ok(keypair)
            },
        }
    }
}

/// Output of an ECDH exchange. Zeroized on drop.
pub struct SharedSecret {
    inner: x25519_dalek::SharedSecret,
}

impl SharedSecret {
    /// Raw shared secret bytes, for feeding into the key schedule.
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        self.inner.as_bytes()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Generate a fresh identity keypair.
pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> Keypair {
    Keypair::generate(rng)
}

/// ECDH between our private key and a peer's public key.
///
/// # Errors
///
/// - `KeyImport` if the keys are on different curves or the peer key is a
///   low-order point (the result would not depend on our secret)
pub fn derive_shared_secret(
    secret: &SecretKey,
    peer_public: &PublicKey,
) -> Result<SharedSecret, CryptoError> {
    if secret.curve != peer_public.curve {
        return Err(CryptoError::key_import(format!(
            "curve mismatch: local {}, peer {}",
            secret.curve, peer_public.curve
        )));
    }

    let inner = secret.secret.diffie_hellman(&peer_public.key);
    if !inner.was_contributory() {
        return Err(CryptoError::key_import("peer public key is a low-order point"));
    }

    Ok(SharedSecret { inner })
}

fn decode_b64url(value: &str, what: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|err| CryptoError::key_import(format!("{what} is not base64url: {err}")))
}

fn fixed_bytes(bytes: &[u8], what: &str) -> Result<[u8; X25519_KEY_SIZE], CryptoError> {
    <[u8; X25519_KEY_SIZE]>::try_from(bytes).map_err(|_| {
        CryptoError::key_import(format!(
            "{what} must be {X25519_KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}
