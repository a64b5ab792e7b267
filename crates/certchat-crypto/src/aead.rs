//! Authenticated encryption using `ChaCha20-Poly1305`
//!
//! All functions are pure. Nonces come from the caller; inside a session they
//! are derived from the message sequence number so they can never repeat
//! under one key.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{error::CryptoError, kdf::KEY_SIZE};

/// Nonce size (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Build a nonce from a message counter.
///
/// Structure:
/// - bytes 0-3: zero
/// - bytes 4-11: counter (big-endian)
pub fn nonce_from_counter(counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[4..12].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Encrypt `plaintext` and bind `aad`.
///
/// Returns ciphertext with the 16-byte tag appended.
pub fn aead_seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.into());

    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    ciphertext
}

/// Decrypt and authenticate.
///
/// # Errors
///
/// - `Authentication` for any failure. Wrong key, modified ciphertext,
///   modified nonce, modified `aad` and truncated input all look the same.
pub fn aead_open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(key.into());

    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];

    #[test]
    fn seal_open_roundtrip() {
        let nonce = nonce_from_counter(0);
        let ciphertext = aead_seal(&KEY, &nonce, b"Hello, World!", b"header");
        let plaintext = aead_open(&KEY, &nonce, &ciphertext, b"header").unwrap();
        assert_eq!(plaintext, b"Hello, World!");
    }

    #[test]
    fn ciphertext_is_plaintext_plus_tag() {
        let ciphertext = aead_seal(&KEY, &nonce_from_counter(1), b"test message", b"");
        assert_eq!(ciphertext.len(), b"test message".len() + TAG_SIZE);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let nonce = nonce_from_counter(2);
        let ciphertext = aead_seal(&KEY, &nonce, b"", b"");
        assert_eq!(ciphertext.len(), TAG_SIZE);
        assert_eq!(aead_open(&KEY, &nonce, &ciphertext, b"").unwrap(), b"");
    }

    #[test]
    fn wrong_key_fails() {
        let nonce = nonce_from_counter(0);
        let ciphertext = aead_seal(&KEY, &nonce, b"secret", b"");
        let result = aead_open(&[0x43; KEY_SIZE], &nonce, &ciphertext, b"");
        assert_eq!(result, Err(CryptoError::Authentication));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let nonce = nonce_from_counter(0);
        let mut ciphertext = aead_seal(&KEY, &nonce, b"original message", b"");
        ciphertext[0] ^= 0xFF;
        assert_eq!(aead_open(&KEY, &nonce, &ciphertext, b""), Err(CryptoError::Authentication));
    }

    #[test]
    fn wrong_nonce_fails() {
        let ciphertext = aead_seal(&KEY, &nonce_from_counter(5), b"message", b"");
        let result = aead_open(&KEY, &nonce_from_counter(6), &ciphertext, b"");
        assert_eq!(result, Err(CryptoError::Authentication));
    }

    #[test]
    fn wrong_aad_fails() {
        let nonce = nonce_from_counter(0);
        let ciphertext = aead_seal(&KEY, &nonce, b"message", b"alice->bob");
        let result = aead_open(&KEY, &nonce, &ciphertext, b"bob->alice");
        assert_eq!(result, Err(CryptoError::Authentication));
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let nonce = nonce_from_counter(0);
        let ciphertext = aead_seal(&KEY, &nonce, b"message", b"");
        assert!(aead_open(&KEY, &nonce, &ciphertext[..TAG_SIZE - 1], b"").is_err());
        assert!(aead_open(&KEY, &nonce, &[], b"").is_err());
    }

    #[test]
    fn nonce_structure() {
        let nonce = nonce_from_counter(0x0102_0304_0506_0708);
        assert_eq!(&nonce[0..4], &[0, 0, 0, 0]);
        assert_eq!(&nonce[4..12], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn distinct_counters_give_distinct_nonces() {
        assert_ne!(nonce_from_counter(0), nonce_from_counter(1));
        assert_ne!(nonce_from_counter(1), nonce_from_counter(1 << 32));
    }
}
