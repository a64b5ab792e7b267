//! Messenger: one local identity, its trust store and its sessions.
//!
//! All methods take `&self`. A `Messenger` can be shared between threads
//! behind an `Arc`; sends and receives for different peers run in parallel,
//! those for the same peer are serialized by that peer's session lock.

use std::fmt;

use certchat_crypto::{AuthorityPublicKey, EscrowCiphertext, Keypair, PublicKey};
use certchat_proto::{Certificate, Role, SignedCertificate, WireEnvelope};
use parking_lot::Mutex;
use rand::{CryptoRng, RngCore, SeedableRng, rngs::StdRng};

use crate::{
    config::MessengerConfig,
    error::{MessengerError, Result},
    session::{Install, Session, SessionState, SessionStore},
    trust::{TrustStore, VerifiedCertificate, verify_certificate},
};

/// Certificate-authenticated messaging endpoint for one identity.
pub struct Messenger {
    username: String,
    keypair: Keypair,
    authority: AuthorityPublicKey,
    config: MessengerConfig,
    trust: TrustStore,
    sessions: SessionStore,
    /// Randomness for escrow sealing at session establishment
    rng: Mutex<StdRng>,
}

impl Messenger {
    /// Create a messenger for an existing identity keypair.
    ///
    /// `rng` seeds the generator used when a session key is sealed to the
    /// escrow key.
    pub fn new<R: RngCore + CryptoRng>(
        username: impl Into<String>,
        keypair: Keypair,
        authority: AuthorityPublicKey,
        config: MessengerConfig,
        rng: &mut R,
    ) -> Self {
        let mut seed = <StdRng as SeedableRng>::Seed::default();
        rng.fill_bytes(&mut seed);

        Self {
            username: username.into(),
            keypair,
            authority,
            config,
            trust: TrustStore::new(),
            sessions: SessionStore::default(),
            rng: Mutex::new(StdRng::from_seed(seed)),
        }
    }

    /// Create a messenger with a freshly generated identity keypair.
    pub fn generate<R: RngCore + CryptoRng>(
        username: impl Into<String>,
        authority: AuthorityPublicKey,
        config: MessengerConfig,
        rng: &mut R,
    ) -> Self {
        let keypair = Keypair::generate(rng);
        Self::new(username, keypair, authority, config, rng)
    }

    /// Local username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Local key-agreement public key.
    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public()
    }

    /// Active configuration.
    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    /// Unsigned certificate for the local identity, ready to be signed by
    /// the authority.
    pub fn generate_certificate(&self, role: Role) -> Certificate {
        Certificate::new(self.username.clone(), role, self.keypair.public())
    }

    /// Verify a peer certificate and add it to the trust store under
    /// `username`.
    ///
    /// Registering a new key for a username that already has an established
    /// session discards that session; the next message starts a new one.
    ///
    /// # Errors
    ///
    /// - `InvalidCertificate` if verification fails, if the certificate is
    ///   for another username, or if it names the local identity
    /// - `KeyImport` if the certified key cannot be imported
    pub fn register_certificate(
        &self,
        username: &str,
        certificate: &Certificate,
        signature: &[u8],
    ) -> Result<()> {
        let verified =
            self.verify_peer(username, certificate, signature).inspect_err(|err| {
                tracing::warn!(%username, error = %err, "rejected certificate");
            })?;

        let peer = verified.username().to_string();
        let new_key = *verified.public_key();

        if let Some(previous) = self.trust.insert(verified)
            && previous.public_key() != &new_key
            && self.sessions.remove(&peer)
        {
            tracing::warn!(%peer, "peer key changed, discarding session");
        }

        tracing::debug!(%peer, role = %certificate.role, "registered certificate");
        Ok(())
    }

    /// [`Self::register_certificate`] for a certificate in transport form.
    pub fn register_signed_certificate(&self, signed: &SignedCertificate) -> Result<()> {
        let certificate = &signed.certificate;
        self.register_certificate(&certificate.username, certificate, &signed.signature)
    }

    /// Encrypt a message to a peer.
    ///
    /// Establishes the session on first use.
    ///
    /// # Errors
    ///
    /// - `UnknownPeer` if no certificate is registered for `peer`
    /// - `CounterExhausted` if the sending counter is at its limit
    pub fn send(&self, peer: &str, plaintext: &[u8]) -> Result<WireEnvelope> {
        self.with_session(peer, |session| session.seal(plaintext))
    }

    /// Decrypt a message from a peer.
    ///
    /// The first message from a peer establishes the session, which is only
    /// stored if that message opens.
    ///
    /// # Errors
    ///
    /// - `UnknownPeer` if no certificate is registered for `peer`
    /// - `ReplayOrOrdering` if the envelope is not the next one expected
    /// - `Authentication` if the envelope does not open
    pub fn receive(&self, peer: &str, envelope: &WireEnvelope) -> Result<Vec<u8>> {
        self.with_session(peer, |session| session.open(envelope)).inspect_err(|err| {
            tracing::warn!(
                %peer,
                sequence = envelope.header.sequence,
                error = %err,
                "rejected message"
            );
        })
    }

    /// [`Self::receive`] for an envelope in transport form.
    ///
    /// # Errors
    ///
    /// - `Protocol` if the JSON is not an envelope
    /// - everything [`Self::receive`] returns
    pub fn receive_json(&self, peer: &str, json: &str) -> Result<Vec<u8>> {
        let envelope = WireEnvelope::from_json(json)?;
        self.receive(peer, &envelope)
    }

    /// Session state with a peer. Only counters are exposed.
    pub fn session_state(&self, peer: &str) -> SessionState {
        self.sessions.get(peer).map_or(SessionState::Uninitialized, |s| s.lock().state())
    }

    /// Peers with an established session, sorted.
    pub fn active_connections(&self) -> Vec<String> {
        self.sessions.peers()
    }

    /// Peers with a verified certificate, sorted.
    pub fn trusted_peers(&self) -> Vec<String> {
        self.trust.usernames()
    }

    /// Root key of the session with `peer`, sealed to the configured escrow
    /// key when the session was established.
    ///
    /// Never called by the messenger itself.
    ///
    /// # Errors
    ///
    /// - `EscrowNotConfigured` if the config has no escrow key
    /// - `UninitializedSession` if there is no session with `peer`
    pub fn escrow_session_key(&self, peer: &str) -> Result<EscrowCiphertext> {
        if self.config.escrow_public_key.is_none() {
            return Err(MessengerError::EscrowNotConfigured);
        }
        let session = self
            .sessions
            .get(peer)
            .ok_or_else(|| MessengerError::UninitializedSession { peer: peer.to_string() })?;

        let sealed = session.lock().escrow().cloned().ok_or(MessengerError::EscrowNotConfigured)?;

        tracing::info!(%peer, "released escrowed session key");
        Ok(sealed)
    }

    fn verify_peer(
        &self,
        username: &str,
        certificate: &Certificate,
        signature: &[u8],
    ) -> Result<VerifiedCertificate> {
        if certificate.username != username {
            return Err(MessengerError::invalid_certificate(format!(
                "certificate is for {:?}, not {username:?}",
                certificate.username
            )));
        }

        let verified = verify_certificate(&self.authority, certificate, signature)?;
        if verified.username() == self.username {
            return Err(MessengerError::invalid_certificate(
                "certificate names the local identity",
            ));
        }

        Ok(verified)
    }

    /// Run `op` on the session with `peer`.
    ///
    /// A missing session is established outside the store's lock and only
    /// stored once `op` succeeds on it and its peer key is still trusted.
    fn with_session<T>(&self, peer: &str, op: impl Fn(&mut Session) -> Result<T>) -> Result<T> {
        loop {
            if let Some(session) = self.sessions.get(peer) {
                return op(&mut *session.lock());
            }

            let certificate = self
                .trust
                .get(peer)
                .ok_or_else(|| MessengerError::UnknownPeer { peer: peer.to_string() })?;
            let session = self.establish(&certificate)?;

            match self.sessions.install(session, |s| self.is_current(s), &op)? {
                Install::Created(value) => return Ok(value),
                Install::Occupied(existing) => return op(&mut *existing.lock()),
                Install::Stale => {
                    tracing::debug!(%peer, "peer key changed during establishment, retrying");
                },
            }
        }
    }

    fn establish(&self, peer: &VerifiedCertificate) -> Result<Session> {
        Session::establish(
            &self.config.protocol_label,
            &self.username,
            &self.keypair,
            peer,
            self.config.escrow_public_key.as_ref(),
            &mut *self.rng.lock(),
        )
    }

    /// Whether `session` was derived from the key currently trusted for its
    /// peer.
    fn is_current(&self, session: &Session) -> bool {
        self.trust
            .get(session.peer())
            .is_some_and(|certificate| certificate.public_key() == session.peer_key())
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("username", &self.username)
            .field("trusted_peers", &self.trust.usernames())
            .field("active_connections", &self.sessions.peers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use parking_lot::Mutex;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::authority::CertificateAuthority;

    fn messenger(authority: &CertificateAuthority, name: &str, seed: u64) -> Messenger {
        Messenger::generate(
            name,
            authority.public_key(),
            MessengerConfig::default(),
            &mut ChaCha20Rng::seed_from_u64(seed),
        )
    }

    #[test]
    fn generated_certificate_names_local_identity() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);

        let certificate = alice.generate_certificate(Role::Sender);
        assert_eq!(certificate.username, "alice");
        assert_eq!(certificate.role, Role::Sender);
        assert_eq!(certificate.public_key, alice.public_key().to_jwk());
    }

    #[test]
    fn send_to_unknown_peer_fails() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);

        assert_eq!(
            alice.send("bob", b"hello"),
            Err(MessengerError::UnknownPeer { peer: "bob".to_string() })
        );
        assert!(alice.active_connections().is_empty());
    }

    #[test]
    fn certificate_must_match_claimed_username() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);
        let bob = messenger(&authority, "bob", 2);

        let signed = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
        let result = alice.register_certificate("carol", &signed.certificate, &signed.signature);

        assert!(matches!(result, Err(MessengerError::InvalidCertificate { .. })));
        assert!(alice.trusted_peers().is_empty());

        alice.register_certificate("bob", &signed.certificate, &signed.signature).unwrap();
        assert_eq!(alice.trusted_peers(), vec!["bob".to_string()]);
    }

    #[test]
    fn own_certificate_is_refused() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);

        let signed = authority.sign(alice.generate_certificate(Role::Sender)).unwrap();
        let result = alice.register_signed_certificate(&signed);

        assert!(matches!(result, Err(MessengerError::InvalidCertificate { .. })));
        assert!(alice.trusted_peers().is_empty());
    }

    #[test]
    fn session_is_lazy() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);
        let bob = messenger(&authority, "bob", 2);

        let signed = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
        alice.register_signed_certificate(&signed).unwrap();

        assert_eq!(alice.trusted_peers(), vec!["bob".to_string()]);
        assert_eq!(alice.session_state("bob"), SessionState::Uninitialized);

        alice.send("bob", b"hello").unwrap();
        assert_eq!(
            alice.session_state("bob"),
            SessionState::Established { send_counter: 1, receive_counter: 0 }
        );
        assert_eq!(alice.active_connections(), vec!["bob".to_string()]);
    }

    #[test]
    fn key_change_discards_session() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);
        let bob = messenger(&authority, "bob", 2);
        let new_bob = messenger(&authority, "bob", 3);

        let signed = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
        alice.register_signed_certificate(&signed).unwrap();
        alice.send("bob", b"hello").unwrap();

        // Same key again keeps the session
        alice.register_signed_certificate(&signed).unwrap();
        assert_eq!(alice.active_connections(), vec!["bob".to_string()]);

        let rekeyed = authority.sign(new_bob.generate_certificate(Role::Recipient)).unwrap();
        alice.register_signed_certificate(&rekeyed).unwrap();
        assert_eq!(alice.session_state("bob"), SessionState::Uninitialized);
    }

    #[test]
    fn escrow_requires_configuration_and_session() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let authority = CertificateAuthority::generate(&mut rng);
        let escrow = Keypair::generate(&mut rng);

        let plain = messenger(&authority, "alice", 1);
        assert_eq!(
            plain.escrow_session_key("bob"),
            Err(MessengerError::EscrowNotConfigured)
        );

        let escrowed = Messenger::generate(
            "alice",
            authority.public_key(),
            MessengerConfig::default().with_escrow(*escrow.public()),
            &mut rng,
        );
        assert_eq!(
            escrowed.escrow_session_key("bob"),
            Err(MessengerError::UninitializedSession { peer: "bob".to_string() })
        );
    }

    #[test]
    fn session_from_replaced_key_is_not_stored() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);
        let bob = messenger(&authority, "bob", 2);
        let new_bob = messenger(&authority, "bob", 3);

        let signed = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
        alice.register_signed_certificate(&signed).unwrap();

        // Derived from the old key, then the key is replaced before insert
        let old = alice.establish(&alice.trust.get("bob").unwrap()).unwrap();
        let rekeyed = authority.sign(new_bob.generate_certificate(Role::Recipient)).unwrap();
        alice.register_signed_certificate(&rekeyed).unwrap();

        let result = alice.sessions.install(old, |s| alice.is_current(s), |s| s.seal(b"hello"));
        assert!(matches!(result, Ok(Install::Stale)));
        assert!(alice.active_connections().is_empty());

        // The retry path derives from the new key
        let envelope = alice.send("bob", b"hello").unwrap();
        let alice_cert = authority.sign(alice.generate_certificate(Role::Sender)).unwrap();
        new_bob.register_signed_certificate(&alice_cert).unwrap();
        assert_eq!(new_bob.receive("alice", &envelope).unwrap(), b"hello");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn warnings_during(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        String::from_utf8_lossy(&captured.0.lock()).into_owned()
    }

    #[test]
    fn every_certificate_rejection_is_logged() {
        let authority = CertificateAuthority::generate(&mut ChaCha20Rng::seed_from_u64(0));
        let alice = messenger(&authority, "alice", 1);
        let bob = messenger(&authority, "bob", 2);

        let bob_cert = authority.sign(bob.generate_certificate(Role::Recipient)).unwrap();
        let own_cert = authority.sign(alice.generate_certificate(Role::Sender)).unwrap();
        let mut forged = bob_cert.clone();
        forged.signature[0] ^= 0xFF;

        let rejections: [(&str, &SignedCertificate); 3] =
            [("carol", &bob_cert), ("bob", &forged), ("alice", &own_cert)];
        for (claimed, signed) in rejections {
            let logs = warnings_during(|| {
                let result =
                    alice.register_certificate(claimed, &signed.certificate, &signed.signature);
                assert!(matches!(result, Err(MessengerError::InvalidCertificate { .. })));
            });

            assert!(logs.contains("rejected certificate"), "no warning for {claimed}: {logs}");
            assert!(logs.contains(claimed));
        }

        assert!(alice.trusted_peers().is_empty());
    }
}
