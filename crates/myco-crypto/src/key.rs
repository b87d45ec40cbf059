//! Key derivation: `K = Blake3(sender_pubkey || dest_id_le16 || epoch_le32 [|| psk])`.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A derived 256-bit AEAD key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key(pub(crate) [u8; 32]);

impl Key {
    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl core::fmt::Debug for Key {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Key").field(&"<redacted>").finish()
    }
}

/// Derive the AEAD key for a `(sender_pubkey, dest_id, epoch)` triple.
///
/// `psk`, when present, is mixed in as extra keyed-hash material so
/// `gossip_psk`-configured deployments get domain separation from peers
/// that share a public key namespace but not the PSK.
#[must_use]
pub fn derive_key(sender_pubkey: &[u8; 32], dest_id: u16, epoch: u32, psk: Option<&[u8]>) -> Key {
    let mut hasher = blake3::Hasher::new();
    hasher.update(sender_pubkey);
    hasher.update(&dest_id.to_le_bytes());
    hasher.update(&epoch.to_le_bytes());
    if let Some(psk) = psk {
        hasher.update(psk);
    }
    let mut out = [0u8; 32];
    hasher.finalize_xof().fill(&mut out);
    Key(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differs_by_sender() {
        let k1 = derive_key(&[1u8; 32], 7, 1, None);
        let k2 = derive_key(&[2u8; 32], 7, 1, None);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn differs_by_dest_id() {
        let k1 = derive_key(&[1u8; 32], 7, 1, None);
        let k2 = derive_key(&[1u8; 32], 8, 1, None);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn differs_by_epoch() {
        let k1 = derive_key(&[1u8; 32], 7, 1, None);
        let k2 = derive_key(&[1u8; 32], 7, 2, None);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn differs_by_psk() {
        let k1 = derive_key(&[1u8; 32], 7, 1, Some(b"psk-a"));
        let k2 = derive_key(&[1u8; 32], 7, 1, Some(b"psk-b"));
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn deterministic() {
        let k1 = derive_key(&[3u8; 32], 1, 1, None);
        let k2 = derive_key(&[3u8; 32], 1, 1, None);
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }
}
