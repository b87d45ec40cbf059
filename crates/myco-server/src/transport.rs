//! UDP transport adapter: the only place in `myco-server` that touches a
//! socket. Datagrams in are AEAD-opened and pushed onto a bounded inbox
//! channel; the Node's tick loop drains that channel and never calls
//! into the socket itself (spec §5, §9 "Sans-IO core").
//!
//! A diagnostic plaintext mode (`allow_plaintext`/`force_plaintext`,
//! spec §6) bypasses AEAD verification on receipt: `force_plaintext`
//! skips the open call entirely, `allow_plaintext` falls back to
//! delivering a datagram whose AEAD tag failed to verify instead of
//! dropping it. Outbound packets are always already sealed by the Node
//! before they reach this module, so no send-side bypass exists.

use std::{net::SocketAddr, sync::Arc};

use myco_core::{Peer, PeerTable};
use myco_crypto::{open, CryptoError, EpochKeys, Metrics};
use myco_proto::Packet;
use tokio::{net::UdpSocket, sync::mpsc};

use crate::error::ServerError;

/// A decrypted inbound packet paired with the peer it arrived from.
pub struct Inbound {
    /// The sender, resolved against the peer table if known.
    pub from: Peer,
    /// The opened packet.
    pub packet: Packet,
}

/// An outbound packet queued for sending. The Node seals it before
/// constructing the `SendPacket` action, so this module only encodes
/// and writes it to the wire.
pub struct Outbound {
    /// Destination peer.
    pub to: Peer,
    /// The already-sealed packet to send.
    pub packet: Packet,
}

/// Diagnostic bypass flags for the AEAD layer (spec §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextPolicy {
    /// Accept a datagram whose AEAD tag failed to verify rather than
    /// dropping it.
    pub allow_plaintext: bool,
    /// Skip AEAD seal/open entirely.
    pub force_plaintext: bool,
}

/// Bounded channel capacity for both the inbox and outbox (spec §5
/// "Bounded memory" applies to the transport's queues too).
const CHANNEL_CAPACITY: usize = 1024;

/// Owns the bound UDP socket and the two background tasks that move
/// datagrams between it and the Node's tick loop.
pub struct UdpTransport {
    inbox_rx: mpsc::Receiver<Inbound>,
    outbox_tx: mpsc::Sender<Outbound>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind `addr` and spawn the recv/send tasks.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the socket fails to bind.
    pub async fn bind(
        addr: SocketAddr,
        peer_table: Arc<PeerTable>,
        epoch_keys: Arc<tokio::sync::Mutex<EpochKeys>>,
        psk: Option<Vec<u8>>,
        policy: PlaintextPolicy,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(|source| ServerError::Bind { addr, source })?;
        let socket = Arc::new(socket);

        let (inbox_tx, inbox_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbox_tx, outbox_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(recv_loop(
            Arc::clone(&socket),
            inbox_tx,
            Arc::clone(&peer_table),
            Arc::clone(&epoch_keys),
            psk.clone(),
            policy,
            Arc::clone(&metrics),
        ));
        tokio::spawn(send_loop(socket, outbox_rx));

        Ok(Self { inbox_rx, outbox_tx, local_addr })
    }

    /// The address the underlying socket actually bound to (useful when
    /// `addr`'s port was `0`).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive the next opened inbound packet, waiting if none is ready.
    /// Returns `None` once the recv task has exited.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbox_rx.recv().await
    }

    /// A clone-able handle for queuing outbound packets from the tick
    /// loop without borrowing `self`.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Outbound> {
        self.outbox_tx.clone()
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    inbox_tx: mpsc::Sender<Inbound>,
    peer_table: Arc<PeerTable>,
    epoch_keys: Arc<tokio::sync::Mutex<EpochKeys>>,
    psk: Option<Vec<u8>>,
    policy: PlaintextPolicy,
    metrics: Arc<Metrics>,
) {
    let mut buf = [0u8; Packet::SIZE];
    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(error) => {
                tracing::warn!(%error, "UDP recv failed");
                continue;
            },
        };
        let Ok(mut packet) = Packet::decode(&buf[..len]) else {
            tracing::warn!(%peer_addr, "dropping datagram: malformed packet");
            continue;
        };

        if !policy.force_plaintext {
            let keys = epoch_keys.lock().await;
            if let Err(CryptoError::TagMismatch) = open(&mut packet, &keys, psk.as_deref(), &metrics)
            {
                if !policy.allow_plaintext {
                    tracing::warn!(%peer_addr, "dropping datagram: AEAD tag mismatch");
                    continue;
                }
                tracing::warn!(%peer_addr, "accepting datagram despite AEAD failure (allow_plaintext)");
            }
        }

        let from = peer_table.find(&packet.sender_pubkey()).unwrap_or(Peer {
            public_key: packet.sender_pubkey(),
            node_id: 0,
            addr: peer_addr,
        });

        if inbox_tx.send(Inbound { from, packet }).await.is_err() {
            tracing::info!("inbox receiver dropped, stopping recv loop");
            return;
        }
    }
}

async fn send_loop(socket: Arc<UdpSocket>, mut outbox_rx: mpsc::Receiver<Outbound>) {
    while let Some(Outbound { to, packet }) = outbox_rx.recv().await {
        let bytes = packet.encode();
        if let Err(error) = socket.send_to(&bytes, to.addr).await {
            tracing::warn!(%error, peer = to.node_id, "UDP send failed");
        }
    }
}
