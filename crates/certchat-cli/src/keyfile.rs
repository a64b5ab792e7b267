//! Bootstrap key file: the authority signing key and the escrow keypair.
//!
//! ```text
//! {
//!   "authority": {"signing_key": "<base64>", "public_key": "<base64>"},
//!   "escrow": {"kty": "OKP", "crv": "X25519", "x": "...", "d": "..."}
//! }
//! ```
//!
//! Both halves are secret. The file is created with owner-only permissions
//! on Unix and never overwritten unless asked.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use certchat_client::CertificateAuthority;
use certchat_crypto::{AuthorityPublicKey, AuthoritySigningKey, JwkKeypair, Keypair};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CliError;

/// Authority key pair, base64 encoded.
#[derive(Serialize, Deserialize)]
pub(crate) struct AuthorityKeys {
    signing_key: String,
    pub(crate) public_key: String,
}

impl Drop for AuthorityKeys {
    fn drop(&mut self) {
        self.signing_key.zeroize();
    }
}

/// Contents of a bootstrap key file.
#[derive(Serialize, Deserialize)]
pub(crate) struct KeyFile {
    pub(crate) authority: AuthorityKeys,
    pub(crate) escrow: JwkKeypair,
}

impl KeyFile {
    /// Generate a fresh authority and escrow keypair.
    pub(crate) fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let authority = CertificateAuthority::generate(rng);
        let escrow = Keypair::generate(rng);

        Self {
            authority: AuthorityKeys {
                signing_key: BASE64.encode(authority.signing_key().to_bytes().as_slice()),
                public_key: BASE64.encode(authority.public_key().to_bytes()),
            },
            escrow: escrow.to_jwk(),
        }
    }

    /// Restore the certificate authority, checking the stored public key.
    pub(crate) fn authority(&self) -> Result<CertificateAuthority, CliError> {
        let seed = Zeroizing::new(decode(&self.authority.signing_key, "authority.signing_key")?);
        let authority =
            CertificateAuthority::from_signing_key(AuthoritySigningKey::from_bytes(&seed)?);

        let public = decode(&self.authority.public_key, "authority.public_key")?;
        if authority.public_key() != AuthorityPublicKey::from_bytes(&public)? {
            return Err(CliError::KeyFile(
                "authority public key does not match signing key".to_string(),
            ));
        }

        Ok(authority)
    }

    /// Restore the escrow keypair.
    pub(crate) fn escrow(&self) -> Result<Keypair, CliError> {
        Ok(Keypair::from_jwk(&self.escrow)?)
    }

    /// Write the key file. Refuses to replace an existing file unless
    /// `overwrite` is set.
    pub(crate) fn write(&self, path: &Path, overwrite: bool) -> Result<(), CliError> {
        let json = Zeroizing::new(serde_json::to_string_pretty(self)?);

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(|e| CliError::io(path, e))?;
        file.write_all(json.as_bytes()).map_err(|e| CliError::io(path, e))?;
        file.sync_all().map_err(|e| CliError::io(path, e))?;

        tracing::debug!(path = %path.display(), "wrote key file");
        Ok(())
    }

    /// Read a key file.
    pub(crate) fn read(path: &Path) -> Result<Self, CliError> {
        let json = Zeroizing::new(fs::read_to_string(path).map_err(|e| CliError::io(path, e))?);
        Ok(serde_json::from_str(&json)?)
    }
}

/// Default key file location.
pub(crate) fn default_path() -> PathBuf {
    PathBuf::from("certchat-keys.json")
}

fn decode(value: &str, field: &str) -> Result<Vec<u8>, CliError> {
    BASE64.decode(value).map_err(|e| CliError::KeyFile(format!("{field}: {e}")))
}
