//! Sans-IO gossip/replication core: the Hybrid Logical Clock, the CRDT
//! service store, the write-ahead log, and the `Node` tick state machine
//! that ties them together.
//!
//! Nothing in this crate touches a socket, a file, or a clock. Callers
//! drive [`Node`] with wall-clock reads and inbound bytes and execute the
//! [`NodeAction`]s it emits.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod hlc;
pub mod miss_queue;
pub mod node;
pub mod peer;
pub mod store;
pub mod wal;

pub use error::{NodeError, StoreError, WalError};
pub use hlc::{newer, Clock, Hlc, HlcError};
pub use miss_queue::{Miss, MissQueue};
pub use node::{Node, NodeAction, NodeConfig, NodeLimits};
pub use peer::{NodeIdentity, Peer, PeerTable};
pub use store::ServiceStore;
pub use wal::Wal;
