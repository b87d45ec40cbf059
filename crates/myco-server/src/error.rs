//! Server error taxonomy (spec §7): config errors are fatal at startup,
//! I/O errors from the transport are logged and retried, not propagated
//! out of the run loop.

use thiserror::Error;

/// Startup/runtime errors for the myco daemon.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid or missing configuration (spec §7 Config-class, fatal).
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Binding the UDP socket failed.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        /// The address that failed to bind.
        addr: std::net::SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing persisted WAL/peer-list state failed.
    #[error("persistence I/O error at {path}: {source}")]
    Persistence {
        /// The file path involved.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Node construction rejected the loaded configuration or WAL state.
    #[error(transparent)]
    Node(#[from] myco_core::NodeError),

    /// Neither a tick nor an inbound packet was processed within the
    /// configured watchdog interval; the daemon exits so its supervisor
    /// restarts it (spec §5).
    #[error("watchdog timeout: no activity for {elapsed:?} (limit {limit:?})")]
    Watchdog {
        /// How long the daemon had been idle.
        elapsed: std::time::Duration,
        /// The configured watchdog interval.
        limit: std::time::Duration,
    },

    /// The inbound transport channel closed unexpectedly (its recv task
    /// panicked or exited).
    #[error("UDP transport inbox closed")]
    TransportClosed,
}
