//! certchat messaging engine
//!
//! Certificate-authenticated two-party messaging. A [`Messenger`] owns one
//! identity keypair, a [`TrustStore`] of peer certificates verified against
//! the certificate authority, and one session per peer.
//!
//! # Flow
//!
//! ```text
//! generate_certificate ──► authority signs ──► peer: register_certificate
//!                                                   │
//!                               first send/receive  ▼
//!                       ECDH(local secret, peer public) ──► root key
//!                                                   │ split
//!                                     sending chain ┴ receiving chain
//!                                          │                 │
//!                                   send: seal         receive: open
//! ```
//!
//! The root key is dropped once split. With escrow configured it is first
//! sealed to the escrow key, and only that ciphertext is kept.
//!
//! # Components
//!
//! - [`Messenger`]: Engine entry point; all methods take `&self`
//! - [`CertificateAuthority`]: Issues certificates (bootstrap and tests)
//! - [`TrustStore`]: Peer certificates that passed [`verify_certificate`]
//! - [`codec`]: Seals one message under one message key

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod authority;
pub mod codec;
mod config;
mod error;
mod messenger;
mod session;
mod trust;

pub use authority::CertificateAuthority;
pub use config::{DEFAULT_PROTOCOL_LABEL, MessengerConfig};
pub use error::{MessengerError, Result};
pub use messenger::Messenger;
pub use session::SessionState;
pub use trust::{TrustStore, VerifiedCertificate, verify_certificate};
