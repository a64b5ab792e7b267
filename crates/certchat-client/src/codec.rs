//! Message codec: one message key, one AEAD operation, one envelope.

use certchat_crypto::{MessageKey, aead_open, aead_seal, nonce_from_counter};
use certchat_proto::{EnvelopeHeader, WireEnvelope};

use crate::error::{MessengerError, Result};

/// Associated data for one message.
///
/// Binds the protocol label, both usernames (sender first) and the sequence
/// number. Strings are length-prefixed so that no two distinct inputs encode
/// the same bytes.
pub fn associated_data(label: &str, sender: &str, recipient: &str, sequence: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(label.len() + sender.len() + recipient.len() + 32);
    for field in [label, sender, recipient] {
        aad.extend_from_slice(&(field.len() as u64).to_be_bytes());
        aad.extend_from_slice(field.as_bytes());
    }
    aad.extend_from_slice(&sequence.to_be_bytes());
    aad
}

/// Seal a plaintext under a message key.
///
/// The sequence number is the key's generation, and the nonce is derived
/// from it, so a nonce never repeats under one chain.
pub fn encode(message_key: &MessageKey, plaintext: &[u8], aad: &[u8]) -> WireEnvelope {
    let sequence = message_key.generation();
    let iv = nonce_from_counter(sequence);
    let ciphertext = aead_seal(message_key.key(), &iv, plaintext, aad);

    WireEnvelope::new(EnvelopeHeader { iv, sequence }, ciphertext)
}

/// Open an envelope with a message key.
///
/// Uses the nonce from the header as received.
///
/// # Errors
///
/// - `Authentication` on any failure, including an envelope whose sequence
///   does not belong to this key. No partial plaintext is returned.
pub fn decode(message_key: &MessageKey, envelope: &WireEnvelope, aad: &[u8]) -> Result<Vec<u8>> {
    if envelope.header.sequence != message_key.generation() {
        return Err(MessengerError::Authentication);
    }

    aead_open(message_key.key(), &envelope.header.iv, &envelope.ciphertext, aad)
        .map_err(|_| MessengerError::Authentication)
}
