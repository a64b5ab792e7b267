//! In-process Alice/Bob exchange.
//!
//! Runs the whole protocol with both parties in one process: certificates
//! are issued, passed around as JSON, verified, and then a message and a
//! reply travel as JSON envelopes. Every transport payload is logged.

use certchat_client::{CertificateAuthority, Messenger, MessengerConfig, MessengerError, codec};
use certchat_crypto::{Keypair, SymmetricRatchet, escrow_decrypt_session_key};
use certchat_proto::{Role, SignedCertificate};
use rand::{CryptoRng, RngCore};

use crate::{error::CliError, keyfile::KeyFile};

/// Reply Bob sends after receiving the first message
const REPLY: &str = "hi";

/// What happened during a demo run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transcript {
    /// Plaintext Bob opened
    pub(crate) bob_received: Vec<u8>,
    /// Plaintext Alice opened
    pub(crate) alice_received: Vec<u8>,
    /// Error returned when Alice's first envelope was replayed
    pub(crate) replay_error: Option<MessengerError>,
    /// Alice's first message as read by the escrow holder
    pub(crate) escrow_recovered: Option<Vec<u8>>,
}

/// Run the exchange.
///
/// Keys come from `keys` when given, otherwise they are generated for this
/// run. With `escrow` set, Alice escrows the session key and the escrow
/// holder reads her first message.
pub(crate) fn run<R: RngCore + CryptoRng>(
    keys: Option<&KeyFile>,
    escrow: bool,
    message: &str,
    rng: &mut R,
) -> Result<Transcript, CliError> {
    let authority = match keys {
        Some(keys) => keys.authority()?,
        None => CertificateAuthority::generate(rng),
    };
    let escrow_keypair = match (escrow, keys) {
        (false, _) => None,
        (true, Some(keys)) => Some(keys.escrow()?),
        (true, None) => Some(Keypair::generate(rng)),
    };

    let mut alice_config = MessengerConfig::default();
    if let Some(escrow) = &escrow_keypair {
        alice_config = alice_config.with_escrow(*escrow.public());
    }

    let alice = Messenger::generate("alice", authority.public_key(), alice_config, rng);
    let bob = Messenger::generate("bob", authority.public_key(), MessengerConfig::default(), rng);

    let alice_cert = authority.sign(alice.generate_certificate(Role::Sender))?.to_json()?;
    let bob_cert = authority.sign(bob.generate_certificate(Role::Recipient))?.to_json()?;
    tracing::info!(certificate = %alice_cert, "alice certificate");
    tracing::info!(certificate = %bob_cert, "bob certificate");

    bob.register_signed_certificate(&SignedCertificate::from_json(&alice_cert)?)?;
    alice.register_signed_certificate(&SignedCertificate::from_json(&bob_cert)?)?;

    let hello = alice.send("bob", message.as_bytes())?;
    let hello_json = hello.to_json()?;
    tracing::info!(envelope = %hello_json, "alice -> bob");
    let bob_received = bob.receive_json("alice", &hello_json)?;

    let reply_json = bob.send("alice", REPLY.as_bytes())?.to_json()?;
    tracing::info!(envelope = %reply_json, "bob -> alice");
    let alice_received = alice.receive_json("bob", &reply_json)?;

    let replay_error = bob.receive_json("alice", &hello_json).err();
    match &replay_error {
        Some(err) => tracing::info!(error = %err, "replay rejected"),
        None => return Err(CliError::Demo("replayed envelope was accepted".to_string())),
    }

    let escrow_recovered = match &escrow_keypair {
        Some(escrow) => {
            let sealed = alice.escrow_session_key("bob")?;
            let root = escrow_decrypt_session_key(escrow, &sealed)?;

            // Alice sorts before Bob and sends on the first chain
            let (alice_sending, _) = root.split();
            let key = SymmetricRatchet::new(alice_sending).advance()?;
            let aad = codec::associated_data(
                &alice.config().protocol_label,
                alice.username(),
                bob.username(),
                hello.header.sequence,
            );
            let recovered = codec::decode(&key, &hello, &aad)?;
            tracing::info!(bytes = recovered.len(), "escrow holder opened alice's message");
            Some(recovered)
        },
        None => None,
    };

    Ok(Transcript { bob_received, alice_received, replay_error, escrow_recovered })
}
