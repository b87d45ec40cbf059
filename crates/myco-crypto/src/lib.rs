//! Packet-level AEAD for myco's gossip protocol.
//!
//! Pipeline: `sender_pubkey + dest_id + epoch [+ psk]` are hashed with
//! BLAKE3 into a 256-bit key; `ChaCha20-Poly1305` seals the packet payload
//! under a nonce built from the epoch and 8 random bytes; the packet's
//! 46-byte associated-data prefix (see `myco-proto::Packet::associated_data`)
//! is bound into the tag so any tamper of routing fields fails `open`.
//!
//! Two epochs (current + previous) may be active at once so a key rotation
//! does not drop packets already in flight.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod epoch;
mod key;
mod metrics;
mod seal;

pub use epoch::EpochKeys;
pub use key::{derive_key, Key};
pub use metrics::Metrics;
pub use seal::{open, seal, CryptoError};
