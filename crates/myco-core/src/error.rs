//! Error taxonomy for the gossip/replication core (spec §7): by kind, not
//! by type name. Transient conditions are retried next tick; integrity
//! failures drop the offending message; resource/config/durability
//! failures get dedicated handling below.

use thiserror::Error;

use crate::hlc::HlcError;

/// Errors from the CRDT service store.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The store is at capacity and `id` was not already present.
    #[error("service store at capacity")]
    CapacityExhausted,
}

/// Errors from the write-ahead log.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WalError {
    /// The log buffer has no room for another entry.
    #[error("WAL log buffer full")]
    LogFull,
    /// The snapshot buffer has no room for the supplied bytes.
    #[error("WAL snapshot buffer full")]
    SnapshotFull,
    /// Log was full and the best-effort compaction also failed.
    #[error("WAL durability failure: log full and compaction failed")]
    Fatal,
}

/// Top-level Node error, unifying the sub-component error kinds plus
/// config-class errors detected at construction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// Propagated from the HLC (logical counter overflow).
    #[error(transparent)]
    Hlc(#[from] HlcError),
    /// Propagated from the CRDT store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Propagated from the WAL.
    #[error(transparent)]
    Wal(#[from] WalError),
    /// Invalid configuration detected at startup (e.g. AEAD key missing in
    /// non-plaintext mode). Fatal: the node must not start.
    #[error("invalid configuration: {0}")]
    Config(&'static str),
}
