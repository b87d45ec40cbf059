//! Error types for packet and digest (de)serialization.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Failures produced while framing or parsing wire data.
///
/// All variants here are the "Integrity" class of the error taxonomy:
/// malformed or truncated input, never a transient I/O condition (that
/// belongs to the transport adapter).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer handed to `Packet::decode` was smaller than `Packet::SIZE`.
    #[error("packet too short: expected {expected} bytes, got {actual}")]
    PacketTooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// Magic number did not match `Packet::MAGIC`.
    #[error("invalid packet magic")]
    InvalidMagic,

    /// `payload_len` exceeded `Packet::MAX_PAYLOAD`.
    #[error("payload_len {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// Declared payload length.
        size: usize,
        /// Maximum allowed payload length.
        max: usize,
    },

    /// `msg_type` byte did not correspond to a known [`crate::MsgType`].
    #[error("unknown msg_type byte {0}")]
    UnknownMsgType(u8),

    /// Digest buffer ran out of bytes mid-varint or mid-count.
    #[error("digest buffer corrupt")]
    DigestCorrupt,

    /// Digest encode target buffer could not hold the declared entry count.
    #[error("digest buffer full")]
    BufferFull,
}
