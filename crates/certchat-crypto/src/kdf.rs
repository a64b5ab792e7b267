//! HMAC and HKDF key derivation
//!
//! Every derived key in certchat comes out of one of these two functions.
//! Both are deterministic and one-way.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Size of every symmetric key in the system (32 bytes)
pub const KEY_SIZE: usize = 32;

/// A derived key that is zeroized when dropped.
pub type OutputKey = Zeroizing<[u8; KEY_SIZE]>;

/// Label used to normalize HKDF input key material
const IKM_LABEL: &[u8] = b"0";

/// Labels that turn one salt into two independent salts
const FIRST_SALT_LABEL: &[u8] = b"salt1";
const SECOND_SALT_LABEL: &[u8] = b"salt2";

/// HMAC-SHA256 of `data` under `key`.
pub fn hmac(key: &[u8], data: &[u8]) -> [u8; KEY_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(data);
    let result = mac.finalize().into_bytes();

    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&result);
    out
}

/// Produce two independent keys from one input.
///
/// The input is first normalized as `HMAC(ikm, "0")`. The salt is split into
/// `HMAC(salt, "salt1")` and `HMAC(salt, "salt2")`, and each half drives one
/// HKDF-SHA256 extract/expand with the same `info`. Knowing one output says
/// nothing about the other.
pub fn hkdf_expand(ikm: &[u8], salt: &[u8], info: &[u8]) -> (OutputKey, OutputKey) {
    let normalized = Zeroizing::new(hmac(ikm, IKM_LABEL));
    let first_salt = Zeroizing::new(hmac(salt, FIRST_SALT_LABEL));
    let second_salt = Zeroizing::new(hmac(salt, SECOND_SALT_LABEL));

    (
        hkdf_derive(normalized.as_slice(), Some(first_salt.as_slice()), info),
        hkdf_derive(normalized.as_slice(), Some(second_salt.as_slice()), info),
    )
}

/// Single HKDF-SHA256 extract and expand to one 32-byte key.
pub(crate) fn hkdf_derive(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> OutputKey {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    let Ok(()) = hkdf.expand(info, okm.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    okm
}
