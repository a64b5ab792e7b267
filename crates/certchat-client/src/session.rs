//! Per-peer sessions and the session store.
//!
//! A session is created lazily from one ECDH exchange and then only moves
//! forward: each sealed or opened message commits one ratchet step in its
//! direction.

use std::{collections::HashMap, fmt, sync::Arc};

use certchat_crypto::{
    EscrowCiphertext, Keypair, PublicKey, RootKey, SymmetricRatchet, derive_shared_secret,
    escrow_encrypt_session_key,
};
use certchat_proto::WireEnvelope;
use parking_lot::{Mutex, RwLock};
use rand::{CryptoRng, RngCore};

use crate::{
    codec,
    error::{MessengerError, Result},
    trust::VerifiedCertificate,
};

/// Observable state of the session with one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No message has been sent to or received from the peer yet
    Uninitialized,

    /// Session keys are derived
    Established {
        /// Sequence number of the next outgoing message
        send_counter: u64,
        /// Sequence number the next incoming message must carry
        receive_counter: u64,
    },
}

/// Session with one peer.
///
/// # Invariants
///
/// - `sending` and `receiving` were split from the root key, with the
///   direction chosen by username order so that our sending chain is the
///   peer's receiving chain
/// - The root key itself is not kept. With escrow configured only its
///   sealed form survives establishment.
/// - Counters only increase, and only after a successful AEAD operation
pub(crate) struct Session {
    protocol_label: String,
    local: String,
    peer: String,
    peer_key: PublicKey,
    escrow: Option<EscrowCiphertext>,
    sending: SymmetricRatchet,
    receiving: SymmetricRatchet,
}

impl Session {
    /// Derive a session from our keypair and the peer's verified key,
    /// sealing the root key to `escrow` when one is given.
    pub(crate) fn establish<R: RngCore + CryptoRng>(
        protocol_label: &str,
        local: &str,
        keypair: &Keypair,
        peer: &VerifiedCertificate,
        escrow: Option<&PublicKey>,
        rng: &mut R,
    ) -> Result<Self> {
        let shared = derive_shared_secret(keypair.secret(), peer.public_key())?;
        let root_key = RootKey::from_shared_secret(&shared);
        let (first, second) = root_key.split();
        let escrow = escrow
            .map(|escrow_key| escrow_encrypt_session_key(escrow_key, &root_key, rng))
            .transpose()?;
        drop(root_key);

        // The lower username sends on the first chain
        let (sending, receiving) =
            if local < peer.username() { (first, second) } else { (second, first) };

        Ok(Self {
            protocol_label: protocol_label.to_string(),
            local: local.to_string(),
            peer: peer.username().to_string(),
            peer_key: *peer.public_key(),
            escrow,
            sending: SymmetricRatchet::new(sending),
            receiving: SymmetricRatchet::new(receiving),
        })
    }

    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    /// Peer key the session was derived from.
    pub(crate) fn peer_key(&self) -> &PublicKey {
        &self.peer_key
    }

    /// Root key sealed to the escrow key at establishment.
    pub(crate) fn escrow(&self) -> Option<&EscrowCiphertext> {
        self.escrow.as_ref()
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::Established {
            send_counter: self.sending.generation(),
            receive_counter: self.receiving.generation(),
        }
    }

    /// Seal the next outgoing message.
    pub(crate) fn seal(&mut self, plaintext: &[u8]) -> Result<WireEnvelope> {
        let step = self.sending.prepare()?;
        let sequence = step.generation();

        let aad = codec::associated_data(&self.protocol_label, &self.local, &self.peer, sequence);
        let envelope = codec::encode(step.message_key(), plaintext, &aad);

        self.sending.commit(step)?;
        tracing::trace!(peer = %self.peer, sequence, "sealed message");

        Ok(envelope)
    }

    /// Open the next incoming message.
    ///
    /// The sequence is checked before anything is derived; the receiving
    /// chain only advances if the AEAD open succeeds.
    pub(crate) fn open(&mut self, envelope: &WireEnvelope) -> Result<Vec<u8>> {
        let expected = self.receiving.generation();
        let received = envelope.header.sequence;
        if received != expected {
            return Err(MessengerError::ReplayOrOrdering { expected, received });
        }

        let step = self.receiving.prepare()?;
        let aad = codec::associated_data(&self.protocol_label, &self.peer, &self.local, received);
        let plaintext = codec::decode(step.message_key(), envelope, &aad)?;

        self.receiving.commit(step)?;
        tracing::trace!(peer = %self.peer, sequence = received, "opened message");

        Ok(plaintext)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("local", &self.local)
            .field("peer", &self.peer)
            .field("escrowed", &self.escrow.is_some())
            .field("sending", &self.sending)
            .field("receiving", &self.receiving)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`SessionStore::install`].
pub(crate) enum Install<T> {
    /// The session was stored after its first operation succeeded
    Created(T),
    /// Another caller stored a session for the peer first
    Occupied(Arc<Mutex<Session>>),
    /// The session was derived from a key that is no longer trusted
    Stale,
}

/// Established sessions by peer username.
///
/// The map lock is held only for lookup, insert and the first operation on
/// a new session. Each session has its own lock, held by the caller for a
/// whole seal or open.
#[derive(Debug, Default)]
pub(crate) struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub(crate) fn get(&self, peer: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().get(peer).map(Arc::clone)
    }

    /// Store a freshly established session once `first_use` succeeds on it.
    ///
    /// Under the map lock: an existing session wins, a session for which
    /// `is_current` is false is discarded, and a failing `first_use`
    /// discards the session and leaves the map untouched.
    pub(crate) fn install<T>(
        &self,
        mut session: Session,
        is_current: impl FnOnce(&Session) -> bool,
        first_use: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<Install<T>> {
        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(session.peer()) {
            return Ok(Install::Occupied(Arc::clone(existing)));
        }
        if !is_current(&session) {
            return Ok(Install::Stale);
        }

        let value = first_use(&mut session)?;
        tracing::debug!(peer = session.peer(), "session established");
        sessions.insert(session.peer().to_string(), Arc::new(Mutex::new(session)));

        Ok(Install::Created(value))
    }

    pub(crate) fn remove(&self, peer: &str) -> bool {
        self.sessions.write().remove(peer).is_some()
    }

    pub(crate) fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.sessions.read().keys().cloned().collect();
        peers.sort_unstable();
        peers
    }
}
