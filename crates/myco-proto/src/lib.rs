//! Wire-level framing for myco's gossip protocol.
//!
//! A [`Packet`] is a fixed 1024-byte, zero-copy structure: header fields
//! useful for O(1) routing, an AEAD nonce/tag, and a 944-byte payload slot.
//! This crate never performs cryptography itself (see `myco-crypto`) and
//! never touches sockets (see `myco-server`'s transport adapter) - it only
//! knows how to lay packets out in memory and how to pack/unpack digests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod digest;
pub mod errors;
pub mod packet;
pub mod service;

pub use digest::DigestEntry;
pub use errors::{ProtocolError, Result};
pub use packet::{MsgType, Packet};
pub use service::Service;
