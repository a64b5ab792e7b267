//! Escrow encryption of session root keys
//!
//! A deployment may require that session key material is also readable by a
//! third-party escrow key. This module only provides the mechanism: an
//! ephemeral-static X25519 exchange to the escrow public key, HKDF to an AEAD
//! key, and a seal of the root key. Whether and when to call it is decided by
//! the caller.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    aead::{NONCE_SIZE, aead_open, aead_seal},
    error::CryptoError,
    kdf::{KEY_SIZE, OutputKey, hkdf_derive},
    keys::{JwkPublicKey, Keypair, PublicKey, SharedSecret, derive_shared_secret},
    ratchet::RootKey,
};

/// HKDF info prefix for escrow key derivation
const ESCROW_INFO: &[u8] = b"certchat escrow v1";

/// A root key sealed to an escrow public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowCiphertext {
    /// Ephemeral public key used for this escrow
    pub ephemeral_public: JwkPublicKey,
    /// Random AEAD nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Sealed root key including Poly1305 tag
    pub ciphertext: Vec<u8>,
}

/// Seal a session root key to the escrow public key.
///
/// # Errors
///
/// - `KeyImport` if the escrow key is unusable for key agreement
pub fn escrow_encrypt_session_key<R: RngCore + CryptoRng>(
    escrow_public: &PublicKey,
    session_root_key: &RootKey,
    rng: &mut R,
) -> Result<EscrowCiphertext, CryptoError> {
    let ephemeral = Keypair::generate(rng);
    let shared = derive_shared_secret(ephemeral.secret(), escrow_public)?;
    let key = escrow_key(&shared, ephemeral.public(), escrow_public);

    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let ciphertext =
        aead_seal(&key, &nonce, session_root_key.as_bytes(), ephemeral.public().as_bytes());

    Ok(EscrowCiphertext { ephemeral_public: ephemeral.public().to_jwk(), nonce, ciphertext })
}

/// Recover a sealed root key with the escrow keypair.
///
/// # Errors
///
/// - `KeyImport` if the ephemeral key in the ciphertext is malformed
/// - `Authentication` if the ciphertext was not sealed to this escrow key or
///   was modified
pub fn escrow_decrypt_session_key(
    escrow: &Keypair,
    sealed: &EscrowCiphertext,
) -> Result<RootKey, CryptoError> {
    let ephemeral = PublicKey::from_jwk(&sealed.ephemeral_public)?;
    let shared = derive_shared_secret(escrow.secret(), &ephemeral)?;
    let key = escrow_key(&shared, &ephemeral, escrow.public());

    let plaintext = Zeroizing::new(aead_open(
        &key,
        &sealed.nonce,
        &sealed.ciphertext,
        ephemeral.as_bytes(),
    )?);
    let root: [u8; KEY_SIZE] =
        plaintext.as_slice().try_into().map_err(|_| CryptoError::Authentication)?;

    Ok(RootKey::from_bytes(root))
}

/// `HKDF(shared, info = label || ephemeral || escrow)`
fn escrow_key(shared: &SharedSecret, ephemeral: &PublicKey, escrow: &PublicKey) -> OutputKey {
    // Capacity: 18 (label) + 32 (ephemeral) + 32 (escrow) = 82
    let mut info = Vec::with_capacity(82);
    info.extend_from_slice(ESCROW_INFO);
    info.extend_from_slice(ephemeral.as_bytes());
    info.extend_from_slice(escrow.as_bytes());

    hkdf_derive(shared.as_bytes(), None, &info)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::ratchet::SymmetricRatchet;

    fn same_root(a: &RootKey, b: &RootKey) -> bool {
        let (a_first, _) = a.split();
        let (b_first, _) = b.split();
        let a_key = SymmetricRatchet::new(a_first).advance().ok();
        let b_key = SymmetricRatchet::new(b_first).advance().ok();
        a_key.is_some() && a_key == b_key
    }

    #[test]
    fn escrow_holder_recovers_root_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let escrow = Keypair::generate(&mut rng);
        let root = RootKey::from_bytes([0x5A; KEY_SIZE]);

        let sealed = escrow_encrypt_session_key(escrow.public(), &root, &mut rng).unwrap();
        let recovered = escrow_decrypt_session_key(&escrow, &sealed).unwrap();

        assert!(same_root(&root, &recovered));
    }

    #[test]
    fn other_key_cannot_recover() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let escrow = Keypair::generate(&mut rng);
        let stranger = Keypair::generate(&mut rng);
        let root = RootKey::from_bytes([0x5A; KEY_SIZE]);

        let sealed = escrow_encrypt_session_key(escrow.public(), &root, &mut rng).unwrap();
        let result = escrow_decrypt_session_key(&stranger, &sealed);

        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn tampered_escrow_fails() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let escrow = Keypair::generate(&mut rng);
        let root = RootKey::from_bytes([0x01; KEY_SIZE]);

        let mut sealed = escrow_encrypt_session_key(escrow.public(), &root, &mut rng).unwrap();
        sealed.ciphertext[3] ^= 0x80;

        assert!(escrow_decrypt_session_key(&escrow, &sealed).is_err());
    }

    #[test]
    fn each_escrow_uses_fresh_ephemeral_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(14);
        let escrow = Keypair::generate(&mut rng);
        let root = RootKey::from_bytes([0x02; KEY_SIZE]);

        let first = escrow_encrypt_session_key(escrow.public(), &root, &mut rng).unwrap();
        let second = escrow_encrypt_session_key(escrow.public(), &root, &mut rng).unwrap();

        assert_ne!(first.ephemeral_public, second.ephemeral_public);
        assert_ne!(first.ciphertext, second.ciphertext);
    }
}
