//! Messenger error types

use certchat_crypto::CryptoError;
use certchat_proto::ProtocolError;
use thiserror::Error;

/// Result alias for messenger operations
pub type Result<T> = std::result::Result<T, MessengerError>;

/// Errors from certificate registration, sending and receiving.
///
/// Every error is local to the call that produced it. A failed call leaves
/// the trust store and every session exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessengerError {
    /// Certificate failed verification: bad or malformed signature, or a
    /// required field is missing
    #[error("invalid certificate: {reason}")]
    InvalidCertificate {
        /// Why the certificate was rejected
        reason: String,
    },

    /// Key material could not be imported
    #[error("key import failed: {reason}")]
    KeyImport {
        /// What was wrong with the key material
        reason: String,
    },

    /// AEAD open failed.
    ///
    /// Wrong key, modified ciphertext and modified nonce are not
    /// distinguished.
    #[error("authentication failed")]
    Authentication,

    /// Envelope sequence is not the next expected value
    #[error("replayed or out-of-order message: expected sequence {expected}, received {received}")]
    ReplayOrOrdering {
        /// Next sequence the session accepts
        expected: u64,
        /// Sequence carried by the envelope
        received: u64,
    },

    /// Operation needs an established session and there is none
    #[error("no established session with {peer}")]
    UninitializedSession {
        /// Peer username
        peer: String,
    },

    /// No verified certificate for the peer
    #[error("unknown peer {peer}")]
    UnknownPeer {
        /// Peer username
        peer: String,
    },

    /// Message counter would overflow
    #[error("message counter exhausted at {current}")]
    CounterExhausted {
        /// Counter value when exhaustion was detected
        current: u64,
    },

    /// Escrow requested but no escrow key is configured
    #[error("no escrow key configured")]
    EscrowNotConfigured,

    /// Wire format error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Ratchet step sequencing error
    #[error("ratchet error: {0}")]
    Ratchet(CryptoError),
}

impl MessengerError {
    pub(crate) fn invalid_certificate(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate { reason: reason.into() }
    }

    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors mean the input was forged, corrupted or can never be
    /// accepted. Non-fatal errors can succeed later: after registering the
    /// peer, after earlier messages arrive, or after configuration changes.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Protocol violations - fatal
            Self::InvalidCertificate { .. } => true,
            Self::KeyImport { .. } => true,
            Self::Authentication => true,
            Self::CounterExhausted { .. } => true,
            Self::Protocol(_) => true,

            // Potentially recoverable
            Self::ReplayOrOrdering { .. } => false,
            Self::UninitializedSession { .. } => false,
            Self::UnknownPeer { .. } => false,
            Self::EscrowNotConfigured => false,
            Self::Ratchet(err) => err.is_fatal(),
        }
    }
}

impl From<CryptoError> for MessengerError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyImport { reason } => Self::KeyImport { reason },
            CryptoError::Authentication => Self::Authentication,
            CryptoError::GenerationOverflow { current } => Self::CounterExhausted { current },
            other @ CryptoError::StaleStep { .. } => Self::Ratchet(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_errors_map_to_messenger_kinds() {
        assert_eq!(
            MessengerError::from(CryptoError::Authentication),
            MessengerError::Authentication
        );
        assert_eq!(
            MessengerError::from(CryptoError::GenerationOverflow { current: u64::MAX }),
            MessengerError::CounterExhausted { current: u64::MAX }
        );
        assert!(matches!(
            MessengerError::from(CryptoError::StaleStep { current: 2, step: 1 }),
            MessengerError::Ratchet(_)
        ));
    }

    #[test]
    fn ordering_errors_are_recoverable() {
        let err = MessengerError::ReplayOrOrdering { expected: 2, received: 1 };
        assert!(!err.is_fatal());
        assert!(!MessengerError::UnknownPeer { peer: "bob".to_string() }.is_fatal());
    }

    #[test]
    fn tampering_is_fatal() {
        assert!(MessengerError::Authentication.is_fatal());
        assert!(MessengerError::invalid_certificate("signature mismatch").is_fatal());
    }

    #[test]
    fn error_display() {
        let err = MessengerError::ReplayOrOrdering { expected: 3, received: 1 };
        assert_eq!(
            err.to_string(),
            "replayed or out-of-order message: expected sequence 3, received 1"
        );
    }
}
