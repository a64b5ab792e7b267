//! Messenger configuration

use certchat_crypto::PublicKey;

/// Protocol label bound into every message's associated data
pub const DEFAULT_PROTOCOL_LABEL: &str = "certchat-v1";

/// Messenger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    /// Label bound into associated data. Both parties must use the same one.
    pub protocol_label: String,

    /// Escrow public key for [`crate::Messenger::escrow_session_key`].
    /// `None` disables escrow.
    pub escrow_public_key: Option<PublicKey>,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self { protocol_label: DEFAULT_PROTOCOL_LABEL.to_string(), escrow_public_key: None }
    }
}

impl MessengerConfig {
    /// Enable escrow to the given public key.
    #[must_use]
    pub fn with_escrow(mut self, escrow_public_key: PublicKey) -> Self {
        self.escrow_public_key = Some(escrow_public_key);
        self
    }
}
