//! Property-based tests for the messenger
//!
//! 1. **Delivery**: any interleaving of sends in both directions, delivered
//!    in order, opens to the original plaintexts
//! 2. **Integrity**: flipping any ciphertext or iv byte fails with
//!    `Authentication` and leaves the receiver able to accept the original
//! 3. **Ordering**: any sequence other than the next expected one fails with
//!    `ReplayOrOrdering`

use certchat_client::{CertificateAuthority, Messenger, MessengerConfig, MessengerError};
use certchat_proto::Role;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn pair(seed: u64) -> (Messenger, Messenger) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let authority = CertificateAuthority::generate(&mut rng);
    let alice =
        Messenger::generate("alice", authority.public_key(), MessengerConfig::default(), &mut rng);
    let bob =
        Messenger::generate("bob", authority.public_key(), MessengerConfig::default(), &mut rng);

    let alice_cert = authority.sign(alice.generate_certificate(Role::Sender)).unwrap();
    let bob_cert = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
    alice.register_signed_certificate(&bob_cert).unwrap();
    bob.register_signed_certificate(&alice_cert).unwrap();

    (alice, bob)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_interleaved_delivery(
        seed in any::<u64>(),
        turns in prop::collection::vec(
            (any::<bool>(), prop::collection::vec(any::<u8>(), 0..64)),
            1..24,
        ),
    ) {
        let (alice, bob) = pair(seed);

        for (from_alice, plaintext) in &turns {
            let (sender, receiver, to, from) = if *from_alice {
                (&alice, &bob, "bob", "alice")
            } else {
                (&bob, &alice, "alice", "bob")
            };

            let envelope = sender.send(to, plaintext).unwrap();
            prop_assert_eq!(&receiver.receive(from, &envelope).unwrap(), plaintext);
        }
    }

    #[test]
    fn prop_any_flipped_byte_fails(
        seed in any::<u64>(),
        plaintext in prop::collection::vec(any::<u8>(), 1..64),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
        in_iv in any::<bool>(),
    ) {
        let (alice, bob) = pair(seed);
        let envelope = alice.send("bob", &plaintext).unwrap();

        let mut tampered = envelope.clone();
        if in_iv {
            let i = position.index(tampered.header.iv.len());
            tampered.header.iv[i] ^= flip;
        } else {
            let i = position.index(tampered.ciphertext.len());
            tampered.ciphertext[i] ^= flip;
        }

        prop_assert_eq!(bob.receive("alice", &tampered), Err(MessengerError::Authentication));
        prop_assert_eq!(bob.receive("alice", &envelope).unwrap(), plaintext);
    }

    #[test]
    fn prop_wrong_sequence_fails(
        seed in any::<u64>(),
        delivered in 0u64..8,
        claimed in 0u64..16,
    ) {
        prop_assume!(claimed != delivered);
        let (alice, bob) = pair(seed);

        for _ in 0..delivered {
            let envelope = alice.send("bob", b"filler").unwrap();
            bob.receive("alice", &envelope).unwrap();
        }

        let mut envelope = alice.send("bob", b"probe").unwrap();
        envelope.header.sequence = claimed;

        prop_assert_eq!(
            bob.receive("alice", &envelope),
            Err(MessengerError::ReplayOrOrdering { expected: delivered, received: claimed })
        );
    }
}
