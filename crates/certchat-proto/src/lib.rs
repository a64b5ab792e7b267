//! certchat wire formats
//!
//! Two records cross the boundary between the messaging core and its
//! transport:
//!
//! - [`Certificate`]: a username, role and public key, signed by the
//!   certificate authority over its canonical CBOR encoding
//! - [`WireEnvelope`]: one sealed message, `{header: {iv, sequence},
//!   ciphertext}`, carried as JSON with base64 byte fields
//!
//! Neither type performs cryptography; they only define shape, canonical
//! bytes and transport encoding.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod b64;
pub mod certificate;
pub mod envelope;
pub mod errors;

pub use certificate::{Certificate, Role, SignedCertificate};
pub use envelope::{EnvelopeHeader, WireEnvelope};
pub use errors::{ProtocolError, Result};
