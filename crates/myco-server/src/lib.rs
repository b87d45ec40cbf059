//! Production daemon for a myco gossip node.
//!
//! Wraps [`myco_core::Node`]'s Sans-IO logic with real I/O: a UDP
//! transport, file-backed WAL persistence, a peer list file, and the
//! admin surface described in the protocol's configuration contract.
//!
//! # Components
//!
//! - [`runtime::Daemon`]: drives the Node with wall-clock ticks and
//!   inbound datagrams, executes the actions it returns, and persists
//!   the WAL after every batch.
//! - [`transport::UdpTransport`]: the only module that touches a socket.
//! - [`persistence`]: the only module that touches the WAL's on-disk
//!   files.
//! - [`admin`]: `GET /metrics` / `POST /deploy` handlers, framing-agnostic.
//! - [`config`]: `MYCO_*` environment + TOML overlay configuration.
//! - [`peer_list`]: the peer list file format.
//! - [`executor`]: the capability invoked on a newly-accepted Deploy.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod admin;
pub mod config;
pub mod error;
pub mod executor;
pub mod peer_list;
pub mod persistence;
pub mod runtime;
pub mod transport;

pub use config::{Config, ConfigError};
pub use error::ServerError;
pub use executor::{Executor, ExecutorError, NoopExecutor};
pub use runtime::{Daemon, RuntimeConfig};
pub use transport::{PlaintextPolicy, UdpTransport};
