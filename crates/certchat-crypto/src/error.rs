//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from primitive and ratchet operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material could not be imported (wrong curve, wrong length, bad
    /// encoding, or a degenerate key agreement result)
    #[error("key import failed: {reason}")]
    KeyImport {
        /// What was wrong with the key material
        reason: String,
    },

    /// AEAD open failed.
    ///
    /// Deliberately carries no detail: a wrong key and a tampered ciphertext
    /// must be indistinguishable to the caller.
    #[error("authentication failed")]
    Authentication,

    /// Ratchet generation would overflow
    #[error("ratchet generation overflow at {current}")]
    GenerationOverflow {
        /// Current generation when overflow was detected
        current: u64,
    },

    /// A prepared step was committed against a ratchet that has moved on
    #[error("stale ratchet step: ratchet at generation {current}, step for {step}")]
    StaleStep {
        /// Current ratchet generation
        current: u64,
        /// Generation the step was prepared for
        step: u64,
    },
}

impl CryptoError {
    pub(crate) fn key_import(reason: impl Into<String>) -> Self {
        Self::KeyImport { reason: reason.into() }
    }

    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate tampering, a bad peer, or a bug. A stale step is
    /// a caller sequencing mistake and can be retried with a fresh step.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::KeyImport { .. } => true,
            Self::Authentication => true,
            Self::GenerationOverflow { .. } => true,

            Self::StaleStep { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_is_fatal() {
        assert!(CryptoError::Authentication.is_fatal());
    }

    #[test]
    fn stale_step_is_not_fatal() {
        assert!(!CryptoError::StaleStep { current: 3, step: 2 }.is_fatal());
    }

    #[test]
    fn authentication_display_is_generic() {
        assert_eq!(CryptoError::Authentication.to_string(), "authentication failed");
    }

    #[test]
    fn error_display() {
        let err = CryptoError::key_import("unsupported curve P-384");
        assert_eq!(err.to_string(), "key import failed: unsupported curve P-384");
    }
}
