//! Fuzz target for envelope JSON decoding
//!
//! # Invariants
//!
//! - Decoding never panics on arbitrary input
//! - Anything that decodes re-encodes and decodes to the same envelope

#![no_main]

use certchat_proto::WireEnvelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = WireEnvelope::from_json(json) {
        let encoded = envelope.to_json().expect("decoded envelope must re-encode");
        let decoded = WireEnvelope::from_json(&encoded).expect("re-encoded envelope must decode");
        assert_eq!(decoded, envelope);
    }
});
