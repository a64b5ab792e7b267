//! certchat Cryptographic Primitives
//!
//! Cryptographic building blocks for certchat. Every operation is a plain
//! synchronous function. Anything that needs randomness takes the RNG as an
//! argument so tests can run on a seeded generator.
//!
//! # Key Lifecycle
//!
//! Two parties holding certified X25519 keys agree on a shared secret once.
//! That secret seeds a root key, which is split into one chain per direction.
//! Each chain is a symmetric ratchet producing one-time message keys.
//!
//! ```text
//! ECDH(local secret, peer public)
//!        │
//!        ▼ HMAC("init")
//! Root Key
//!        │
//!        ▼ HKDF (two salts)
//! Chain Key A ─────────────── Chain Key B
//!        │                          │
//!        ▼ HMAC("message-key")      ▼
//! Message Keys (one per step)   Message Keys
//!        │
//!        ▼
//! ChaCha20-Poly1305 → Ciphertext
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are zeroized as soon as their successor is committed
//! - Message keys are zeroized on drop after their single AEAD operation
//! - Chain derivation is HMAC-SHA256, which has no inverse
//!
//! Direction Isolation:
//! - The two chains come from independent HKDF outputs, so compromising one
//!   direction does not reveal the other
//!
//! Authenticity:
//! - ChaCha20-Poly1305 rejects any modified ciphertext, nonce or associated
//!   data with a single generic error
//! - Peer public keys are only trusted once an authority's Ed25519 signature
//!   over the certificate verifies

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod error;
pub mod escrow;
pub mod kdf;
pub mod keys;
pub mod ratchet;
pub mod signature;

pub use aead::{NONCE_SIZE, TAG_SIZE, aead_open, aead_seal, nonce_from_counter};
pub use error::CryptoError;
pub use escrow::{EscrowCiphertext, escrow_decrypt_session_key, escrow_encrypt_session_key};
pub use kdf::{KEY_SIZE, OutputKey, hkdf_expand, hmac};
pub use keys::{
    Curve, JwkKeypair, JwkPublicKey, Keypair, PublicKey, SecretKey, SharedSecret,
    derive_shared_secret, generate_keypair,
};
pub use ratchet::{ChainKey, MessageKey, PendingStep, RootKey, SymmetricRatchet};
pub use signature::{AuthorityPublicKey, AuthoritySigningKey, SIGNATURE_SIZE, verify_signature};
