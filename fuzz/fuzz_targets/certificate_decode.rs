//! Fuzz target for certificate decoding and verification
//!
//! # Invariants
//!
//! - Decoding and verification never panic on arbitrary input
//! - Nothing an attacker can write without the authority key is accepted

#![no_main]

use certchat_client::{CertificateAuthority, Messenger, MessengerConfig};
use certchat_proto::SignedCertificate;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(signed) = SignedCertificate::from_json(json) else {
        return;
    };

    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let authority = CertificateAuthority::generate(&mut rng);
    let messenger =
        Messenger::generate("fuzz", authority.public_key(), MessengerConfig::default(), &mut rng);

    assert!(messenger.register_signed_certificate(&signed).is_err());
    assert!(messenger.trusted_peers().is_empty());
});
