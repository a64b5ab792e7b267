//! Fuzz target for the messenger session state machine
//!
//! Drives two messengers through arbitrary sends, deliveries, replays and
//! tampering.
//!
//! # Invariants
//!
//! - In-order delivery of an untouched envelope always opens to the
//!   plaintext that was sent
//! - Replays, skips and tampered envelopes are always rejected
//! - A rejected envelope never moves the receive counter and never
//!   establishes Bob's session

#![no_main]

use std::collections::VecDeque;

use arbitrary::Arbitrary;
use certchat_client::{
    CertificateAuthority, Messenger, MessengerConfig, MessengerError, SessionState,
};
use certchat_proto::{Role, WireEnvelope};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    /// Alice sends to Bob
    Send { message: Vec<u8> },
    /// Bob receives the oldest undelivered envelope
    Deliver,
    /// Bob receives the most recently delivered envelope again
    Replay,
    /// Bob receives the second oldest undelivered envelope
    Skip,
    /// Bob receives a modified copy of the oldest undelivered envelope
    Tamper { index: u16, mask: u8, sequence: Option<u64> },
}

fn receive_counter(messenger: &Messenger, peer: &str) -> u64 {
    match messenger.session_state(peer) {
        SessionState::Established { receive_counter, .. } => receive_counter,
        SessionState::Uninitialized => 0,
    }
}

fuzz_target!(|scenario: Scenario| {
    let mut rng = ChaCha20Rng::seed_from_u64(scenario.seed);
    let authority = CertificateAuthority::generate(&mut rng);
    let alice =
        Messenger::generate("alice", authority.public_key(), MessengerConfig::default(), &mut rng);
    let bob =
        Messenger::generate("bob", authority.public_key(), MessengerConfig::default(), &mut rng);

    let alice_cert = authority.sign(alice.generate_certificate(Role::Sender)).unwrap();
    let bob_cert = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
    alice.register_signed_certificate(&bob_cert).unwrap();
    bob.register_signed_certificate(&alice_cert).unwrap();

    let mut in_flight: VecDeque<(Vec<u8>, WireEnvelope)> = VecDeque::new();
    let mut last_delivered: Option<WireEnvelope> = None;

    for op in scenario.operations.into_iter().take(256) {
        let before = receive_counter(&bob, "alice");
        let connections = bob.active_connections();
        let mut delivered = false;

        match op {
            Operation::Send { message } => {
                let envelope = alice.send("bob", &message).unwrap();
                in_flight.push_back((message, envelope));
            },
            Operation::Deliver => {
                if let Some((message, envelope)) = in_flight.pop_front() {
                    assert_eq!(bob.receive("alice", &envelope).unwrap(), message);
                    assert_eq!(receive_counter(&bob, "alice"), before + 1);
                    last_delivered = Some(envelope);
                    delivered = true;
                }
            },
            Operation::Replay => {
                if let Some(envelope) = &last_delivered {
                    assert!(matches!(
                        bob.receive("alice", envelope),
                        Err(MessengerError::ReplayOrOrdering { .. })
                    ));
                }
            },
            Operation::Skip => {
                if let Some((_, envelope)) = in_flight.get(1) {
                    assert!(matches!(
                        bob.receive("alice", envelope),
                        Err(MessengerError::ReplayOrOrdering { .. })
                    ));
                }
            },
            Operation::Tamper { index, mask, sequence } => {
                if let Some((_, envelope)) = in_flight.front() {
                    let mut tampered = envelope.clone();
                    if let Some(sequence) = sequence {
                        tampered.header.sequence = sequence;
                    }
                    if !tampered.ciphertext.is_empty() {
                        let i = usize::from(index) % tampered.ciphertext.len();
                        tampered.ciphertext[i] ^= mask;
                    }
                    if tampered != *envelope {
                        assert!(bob.receive("alice", &tampered).is_err());
                    }
                }
            },
        }

        if !delivered {
            assert_eq!(receive_counter(&bob, "alice"), before);
            assert_eq!(bob.active_connections(), connections);
        }
    }
});
