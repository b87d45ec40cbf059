//! The 1024-byte wire packet.
//!
//! Layout (all multi-byte integers little-endian), byte offsets:
//!
//! ```text
//! 0   magic(2) | version(1) | msg_type(1)
//! 4   node_id(2) | zone_id(1) | flags(1)
//! 8   revocation_block(4)
//! 12  payload_len(2) | pad(2)
//! 16  sender_pubkey(32)
//! 48  nonce(12)
//! 60  auth_tag(16)
//! 76  payload(944)
//! 1020 trailer_pad(4)
//! ```
//!
//! The struct is `#[repr(C, packed)]` so its in-memory layout is exactly
//! the wire layout; [`Packet::decode`]/[`Packet::encode`] are zero-copy via
//! `zerocopy`'s `FromBytes`/`IntoBytes`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Message kind carried in [`Packet::msg_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Announces a service catalog entry.
    Deploy = 1,
    /// Carries a delta or sample digest.
    Sync = 2,
    /// Asks a peer to resend a specific id.
    Request = 3,
    /// Liveness / small piggybacked delta.
    Control = 4,
}

impl MsgType {
    /// Convert a raw byte into a [`MsgType`], if it names one.
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Deploy),
            2 => Some(Self::Sync),
            3 => Some(Self::Request),
            4 => Some(Self::Control),
            _ => None,
        }
    }
}

/// Fixed 1024-byte gossip packet.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone, Copy)]
#[repr(C, packed)]
pub struct Packet {
    magic: [u8; 2],
    version: u8,
    msg_type: u8,
    node_id: [u8; 2],
    zone_id: u8,
    flags: u8,
    revocation_block: [u8; 4],
    payload_len: [u8; 2],
    _pad0: [u8; 2],
    sender_pubkey: [u8; 32],
    nonce: [u8; 12],
    auth_tag: [u8; 16],
    payload: [u8; Self::MAX_PAYLOAD],
    _pad1: [u8; 4],
}

const _: () = assert!(core::mem::size_of::<Packet>() == Packet::SIZE);

impl Packet {
    /// Total wire size in bytes.
    pub const SIZE: usize = 1024;
    /// Maximum payload length in bytes.
    pub const MAX_PAYLOAD: usize = 944;
    /// Number of associated-data bytes bound into the AEAD tag.
    pub const AD_LEN: usize = 46;
    /// Wire magic value.
    pub const MAGIC: u16 = 0x4d59;
    /// Current wire version.
    pub const VERSION: u8 = 1;

    /// Build a new, zeroed packet with the given routing fields.
    #[must_use]
    pub fn new(msg_type: MsgType, node_id: u16, zone_id: u8, sender_pubkey: [u8; 32]) -> Self {
        Self {
            magic: Self::MAGIC.to_le_bytes(),
            version: Self::VERSION,
            msg_type: msg_type as u8,
            node_id: node_id.to_le_bytes(),
            zone_id,
            flags: 0,
            revocation_block: [0; 4],
            payload_len: [0; 2],
            _pad0: [0; 2],
            sender_pubkey,
            nonce: [0; 12],
            auth_tag: [0; 16],
            payload: [0; Self::MAX_PAYLOAD],
            _pad1: [0; 4],
        }
    }

    /// Parse a packet out of a byte slice, validating magic/version/size.
    ///
    /// Does not verify the AEAD tag; see `myco-crypto` for that step.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let (packet, _) = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::PacketTooShort { expected: Self::SIZE, actual: bytes.len() })?;
        let packet = *packet;
        if packet.magic() != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }
        let payload_len = packet.payload_len() as usize;
        if payload_len > Self::MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge { size: payload_len, max: Self::MAX_PAYLOAD });
        }
        Ok(packet)
    }

    /// Serialize into a fresh 1024-byte buffer.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// The 46 associated-data bytes bound into the AEAD tag, in wire order.
    #[must_use]
    pub fn associated_data(&self) -> [u8; Self::AD_LEN] {
        let mut ad = [0u8; Self::AD_LEN];
        ad[0..2].copy_from_slice(&self.magic);
        ad[2] = self.version;
        ad[3] = self.msg_type;
        ad[4..6].copy_from_slice(&self.node_id);
        ad[6] = self.zone_id;
        ad[7] = self.flags;
        ad[8..12].copy_from_slice(&self.revocation_block);
        ad[12..14].copy_from_slice(&self.payload_len);
        ad[14..46].copy_from_slice(&self.sender_pubkey);
        ad
    }

    /// Wire magic as read from the packet.
    #[must_use]
    pub fn magic(&self) -> u16 {
        u16::from_le_bytes(self.magic)
    }

    /// Wire version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Decoded message kind, if the raw byte names one.
    #[must_use]
    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_u8(self.msg_type)
    }

    /// Raw `msg_type` byte (useful when logging unknown values).
    #[must_use]
    pub fn msg_type_raw(&self) -> u8 {
        self.msg_type
    }

    /// Destination routing hint.
    #[must_use]
    pub fn node_id(&self) -> u16 {
        u16::from_le_bytes(self.node_id)
    }

    /// Zone/shard hint.
    #[must_use]
    pub fn zone_id(&self) -> u8 {
        self.zone_id
    }

    /// Packet flag bits.
    #[must_use]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Revocation generation counter.
    #[must_use]
    pub fn revocation_block(&self) -> u32 {
        u32::from_le_bytes(self.revocation_block)
    }

    /// Declared payload length (`<= MAX_PAYLOAD`).
    #[must_use]
    pub fn payload_len(&self) -> u16 {
        u16::from_le_bytes(self.payload_len)
    }

    /// Sender's 32-byte public key.
    #[must_use]
    pub fn sender_pubkey(&self) -> [u8; 32] {
        self.sender_pubkey
    }

    /// 12-byte AEAD nonce.
    #[must_use]
    pub fn nonce(&self) -> [u8; 12] {
        self.nonce
    }

    /// 16-byte AEAD tag.
    #[must_use]
    pub fn auth_tag(&self) -> [u8; 16] {
        self.auth_tag
    }

    /// The full 944-byte payload slot.
    #[must_use]
    pub fn payload(&self) -> &[u8; Self::MAX_PAYLOAD] {
        &self.payload
    }

    /// The payload slot, truncated to `payload_len`.
    #[must_use]
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload[..self.payload_len() as usize]
    }

    /// Set the revocation generation counter.
    pub fn set_revocation_block(&mut self, value: u32) {
        self.revocation_block = value.to_le_bytes();
    }

    /// Set the flags byte.
    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    /// Copy `data` into the payload slot and set `payload_len`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `data` does not fit.
    pub fn set_payload(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > Self::MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge { size: data.len(), max: Self::MAX_PAYLOAD });
        }
        self.payload[..data.len()].copy_from_slice(data);
        self.payload[data.len()..].fill(0);
        self.payload_len = (data.len() as u16).to_le_bytes();
        Ok(())
    }

    /// Mutable access to the full payload slot, for in-place sealing.
    pub fn payload_mut(&mut self) -> &mut [u8; Self::MAX_PAYLOAD] {
        &mut self.payload
    }

    /// Set the nonce (called by the AEAD layer before sealing).
    pub fn set_nonce(&mut self, nonce: [u8; 12]) {
        self.nonce = nonce;
    }

    /// Set the auth tag (called by the AEAD layer after sealing).
    pub fn set_auth_tag(&mut self, tag: [u8; 16]) {
        self.auth_tag = tag;
    }
}

impl core::fmt::Debug for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Packet")
            .field("magic", &self.magic())
            .field("version", &self.version())
            .field("msg_type", &self.msg_type_raw())
            .field("node_id", &self.node_id())
            .field("zone_id", &self.zone_id())
            .field("payload_len", &self.payload_len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for Packet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_exactly_1024() {
        assert_eq!(core::mem::size_of::<Packet>(), 1024);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut p = Packet::new(MsgType::Deploy, 7, 1, [9u8; 32]);
        p.set_payload(b"hello").unwrap();
        let bytes = p.encode();
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.payload_bytes(), b"hello");
        assert_eq!(decoded.msg_type(), Some(MsgType::Deploy));
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; 10];
        assert!(matches!(Packet::decode(&buf), Err(ProtocolError::PacketTooShort { .. })));
    }

    #[test]
    fn rejects_bad_magic() {
        let p = Packet::new(MsgType::Sync, 1, 0, [1u8; 32]);
        let mut bytes = p.encode();
        bytes[0] = 0xff;
        assert!(matches!(Packet::decode(&bytes), Err(ProtocolError::InvalidMagic)));
    }

    #[test]
    fn associated_data_is_46_bytes_in_order() {
        let mut p = Packet::new(MsgType::Control, 42, 3, [5u8; 32]);
        p.set_revocation_block(9);
        p.set_payload(b"x").unwrap();
        let ad = p.associated_data();
        assert_eq!(ad.len(), Packet::AD_LEN);
        assert_eq!(&ad[0..2], &Packet::MAGIC.to_le_bytes());
        assert_eq!(ad[3], MsgType::Control as u8);
        assert_eq!(&ad[14..46], &[5u8; 32]);
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut p = Packet::new(MsgType::Deploy, 1, 0, [0u8; 32]);
        let too_big = vec![0u8; Packet::MAX_PAYLOAD + 1];
        assert!(matches!(p.set_payload(&too_big), Err(ProtocolError::PayloadTooLarge { .. })));
    }
}
