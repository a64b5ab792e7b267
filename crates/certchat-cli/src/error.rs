//! CLI error type

use std::path::{Path, PathBuf};

use certchat_client::MessengerError;
use certchat_crypto::CryptoError;
use certchat_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the `certchat` binary
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Reading or writing a file failed
    #[error("{}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Key file content is inconsistent
    #[error("malformed key file: {0}")]
    KeyFile(String),

    /// Key file is not valid JSON
    #[error("key file json: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored key material was rejected
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Messenger operation failed
    #[error(transparent)]
    Messenger(#[from] MessengerError),

    /// Wire format error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The demo exchange did not behave as expected
    #[error("demo failed: {0}")]
    Demo(String),
}

impl CliError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}
