//! Seal/open a [`myco_proto::Packet`] in place.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use myco_proto::Packet;
use thiserror::Error;

use crate::{epoch::EpochKeys, key::derive_key, metrics::Metrics};

/// Failures from sealing or opening a packet.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The AEAD tag did not verify under any active epoch key.
    #[error("AEAD tag verification failed")]
    TagMismatch,
}

/// Build the 12-byte nonce: 4-byte epoch, 8 random bytes.
fn build_nonce(epoch: u32, random: [u8; 8]) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[0..4].copy_from_slice(&epoch.to_le_bytes());
    nonce[4..12].copy_from_slice(&random);
    nonce
}

/// Encrypt `packet`'s declared payload bytes in place under `key`/`epoch`,
/// using `random` as the nonce's entropy, and write the resulting nonce and
/// tag into the packet.
pub fn seal(packet: &mut Packet, key: &crate::Key, epoch: u32, random: [u8; 8]) {
    let nonce_bytes = build_nonce(epoch, random);
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let ad = packet.associated_data();
    let len = packet.payload_len() as usize;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let buf = &mut packet.payload_mut()[..len];
    let tag = cipher
        .encrypt_in_place_detached(nonce, &ad, buf)
        .expect("chacha20poly1305 seal on bounded in-memory buffer cannot fail");
    packet.set_nonce(nonce_bytes);
    packet.set_auth_tag(tag.into());
}

/// Decrypt `packet`'s payload in place.
///
/// The key is re-derived for each candidate epoch from the packet's own
/// `sender_pubkey` and `node_id` fields (the latter is the destination
/// routing hint, which is exactly the `dest_id` the sender derived its
/// sealing key against) - there is nothing to cache, since a node hears
/// from many distinct senders and a single precomputed key could only
/// ever match one of them. Tries `keys.current_epoch()` first, then
/// `keys.previous_epoch()` if present. Increments `metrics`'
/// `packet_mac_failures` counter on total failure and leaves the payload
/// untouched (caller must drop the packet, not deliver it).
///
/// # Errors
///
/// Returns [`CryptoError::TagMismatch`] if no candidate epoch verifies.
pub fn open(
    packet: &mut Packet,
    keys: &EpochKeys,
    psk: Option<&[u8]>,
    metrics: &Metrics,
) -> Result<(), CryptoError> {
    let sender_pubkey = packet.sender_pubkey();
    let dest_id = packet.node_id();
    let ad = packet.associated_data();
    let nonce = Nonce::from_slice(&packet.nonce());
    let tag = packet.auth_tag();
    let len = packet.payload_len() as usize;

    for epoch in keys.candidates() {
        let key = derive_key(&sender_pubkey, dest_id, epoch, psk);
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
        let mut buf = packet.payload()[..len].to_vec();
        if cipher.decrypt_in_place_detached(nonce, &ad, &mut buf, (&tag).into()).is_ok() {
            packet.payload_mut()[..len].copy_from_slice(&buf);
            return Ok(());
        }
    }
    metrics.record_mac_failure();
    Err(CryptoError::TagMismatch)
}
