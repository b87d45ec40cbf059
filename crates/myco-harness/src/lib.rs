//! Deterministic simulator for myco's gossip/replication core (spec §8).
//!
//! Everything here drives [`myco_core::Node`] through its Sans-IO
//! `tick`/`handle_packet`/`inject_service` surface under a virtual clock
//! and a seeded RNG, so runs are fully reproducible from a `u64` seed.
//! No sockets, no wall-clock sleeps, no threads: a [`TestCluster`] steps
//! every node forward one tick at a time and routes
//! [`myco_core::NodeAction::SendPacket`] outputs through a [`SimNetwork`]
//! that can drop packets with a configurable probability.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod network;

pub use cluster::{ClusterConfig, TestCluster};
pub use invariants::{Invariant, InvariantRegistry, Violation};
pub use network::SimNetwork;
