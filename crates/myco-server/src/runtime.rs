//! The daemon run loop: owns the [`Node`], drives it with wall-clock
//! ticks and inbound datagrams, executes the actions it returns, and
//! persists the WAL after every batch. A watchdog (spec §5) exits the
//! process if neither a tick nor a packet has been processed within a
//! configured interval, trusting a supervisor (systemd, a container
//! orchestrator) to restart it.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use myco_core::{Node, NodeAction};
use rand::Rng;

use crate::{error::ServerError, executor::Executor, persistence, transport::UdpTransport};

/// Tunables for [`Daemon::run`] not already captured by [`Node`]'s own
/// `NodeLimits` (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// How often to call [`Node::tick`].
    pub tick_interval: Duration,
    /// Maximum time with no tick and no inbound packet processed before
    /// the daemon exits.
    pub watchdog_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_millis(200), watchdog_timeout: Duration::from_secs(60) }
    }
}

/// Owns the Node and the I/O it's driven by.
pub struct Daemon<R: Rng, E: Executor> {
    node: Node<R>,
    transport: UdpTransport,
    executor: E,
    state_dir: PathBuf,
    config: RuntimeConfig,
}

impl<R: Rng, E: Executor> Daemon<R, E> {
    /// Build a daemon around an already-constructed `node` and a bound
    /// `transport`.
    #[must_use]
    pub fn new(node: Node<R>, transport: UdpTransport, executor: E, state_dir: PathBuf, config: RuntimeConfig) -> Self {
        Self { node, transport, executor, state_dir, config }
    }

    /// Run until a fatal error or the watchdog fires.
    ///
    /// # Errors
    ///
    /// [`ServerError::Watchdog`] if no tick or packet was processed
    /// within the configured interval; [`ServerError::Persistence`] if
    /// writing the WAL back to disk fails; [`ServerError::TransportClosed`]
    /// if the transport's recv task exits.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let outbox = self.transport.sender();
        let mut tick_timer = tokio::time::interval(self.config.tick_interval);
        tick_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_activity = Instant::now();

        loop {
            let deadline = tokio::time::Instant::from_std(last_activity + self.config.watchdog_timeout);
            let mut actions = Vec::new();

            tokio::select! {
                _ = tick_timer.tick() => {
                    self.node.tick(now_ms(), &mut actions);
                }
                inbound = self.transport.recv() => {
                    let Some(inbound) = inbound else { return Err(ServerError::TransportClosed) };
                    self.node.handle_packet(now_ms(), inbound.from, inbound.packet, &mut actions);
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Err(ServerError::Watchdog {
                        elapsed: last_activity.elapsed(),
                        limit: self.config.watchdog_timeout,
                    });
                }
            }
            last_activity = Instant::now();

            if !actions.is_empty() {
                self.dispatch(actions, &outbox).await;
                persistence::save(&self.state_dir, self.node.wal())?;
            }
        }
    }

    async fn dispatch(&self, actions: Vec<NodeAction>, outbox: &tokio::sync::mpsc::Sender<crate::transport::Outbound>) {
        for action in actions {
            match action {
                NodeAction::SendPacket { to, packet } => {
                    if outbox.send(crate::transport::Outbound { to, packet }).await.is_err() {
                        tracing::warn!(peer = to.node_id, "outbox closed, dropping packet");
                    }
                },
                NodeAction::Deployed { service } => {
                    if let Err(error) = self.executor.deploy(&service) {
                        tracing::error!(id = service.id(), %error, "executor failed for accepted Deploy");
                    }
                },
            }
        }
    }
}

#[allow(clippy::disallowed_methods)]
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
