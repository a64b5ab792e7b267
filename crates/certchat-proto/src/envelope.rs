//! Sealed message envelope.
//!
//! On the wire an envelope is JSON:
//!
//! ```text
//! {"header": {"iv": "<base64>", "sequence": 3}, "ciphertext": "<base64>"}
//! ```
//!
//! The ciphertext includes the AEAD tag. The sequence number is the sender's
//! chain generation for this message; receivers reject anything other than
//! the next expected value before touching the ciphertext.

use certchat_crypto::{NONCE_SIZE, TAG_SIZE};
use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Unencrypted envelope header. Authenticated as associated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// AEAD nonce
    #[serde(with = "crate::b64::array")]
    pub iv: [u8; NONCE_SIZE],

    /// Sender's message counter for this conversation
    pub sequence: u64,
}

/// One sealed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Nonce and sequence number
    pub header: EnvelopeHeader,

    /// Ciphertext followed by the authentication tag
    #[serde(with = "crate::b64::bytes")]
    pub ciphertext: Vec<u8>,
}

impl WireEnvelope {
    /// Maximum decoded ciphertext size (16 MB)
    pub const MAX_CIPHERTEXT_SIZE: usize = 16 * 1024 * 1024;

    /// Largest JSON document accepted by [`Self::from_json`]. Base64 expands
    /// by 4/3; the rest is header slack.
    pub const MAX_JSON_SIZE: usize = Self::MAX_CIPHERTEXT_SIZE / 3 * 4 + 1024;

    /// Build an envelope from a header and sealed bytes.
    pub fn new(header: EnvelopeHeader, ciphertext: Vec<u8>) -> Self {
        Self { header, ciphertext }
    }

    /// Length of the plaintext this envelope should open to.
    ///
    /// Returns 0 for ciphertexts shorter than a tag; those never open.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooLarge` if the ciphertext exceeds
    ///   [`Self::MAX_CIPHERTEXT_SIZE`]
    pub fn to_json(&self) -> Result<String> {
        self.check_size()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooLarge` if the document or decoded ciphertext is
    ///   oversized; the document length is checked before parsing
    /// - `ProtocolError::Json` if the document is not an envelope, including
    ///   a non-base64 field or an `iv` of the wrong length
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > Self::MAX_JSON_SIZE {
            return Err(ProtocolError::TooLarge { size: json.len(), max: Self::MAX_JSON_SIZE });
        }
        let envelope: Self = serde_json::from_str(json)?;
        envelope.check_size()?;
        Ok(envelope)
    }

    fn check_size(&self) -> Result<()> {
        if self.ciphertext.len() > Self::MAX_CIPHERTEXT_SIZE {
            return Err(ProtocolError::TooLarge {
                size: self.ciphertext.len(),
                max: Self::MAX_CIPHERTEXT_SIZE,
            });
        }
        Ok(())
    }
}
