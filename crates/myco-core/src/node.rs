//! The Node tick state machine (spec §4.6-4.7): a single-threaded,
//! Sans-IO core. No sockets, no files, no async - callers drive it with
//! `tick`/`handle_packet`/`inject_service` and execute the actions it
//! returns.

use std::{collections::HashMap, sync::Arc};

use myco_crypto::{open, seal, CryptoError, EpochKeys, Metrics};
use myco_proto::{digest, DigestEntry, MsgType, Packet, Service};
use rand::Rng;
use zerocopy::{FromBytes, IntoBytes};

use crate::{
    error::NodeError,
    hlc::{newer, Clock, Hlc},
    miss_queue::MissQueue,
    peer::{NodeIdentity, Peer, PeerTable},
    store::ServiceStore,
    wal::Wal,
};

/// Fixed resource bounds (spec §5 "Bounded memory").
pub struct NodeLimits {
    /// Maximum distinct services tracked.
    pub max_services: usize,
    /// Maximum pending miss-queue entries.
    pub max_missing_items: usize,
    /// Maximum recently-dirty `(id, version)` entries retained for deltas.
    pub max_recent_deltas: usize,
    /// Misses drained per tick.
    pub drain_misses_per_tick: usize,
    /// Ticks between idle sample-digest emissions.
    pub sample_interval_ticks: u64,
    /// Ticks between Control emissions.
    pub control_interval_ticks: u64,
}

impl Default for NodeLimits {
    fn default() -> Self {
        Self {
            max_services: 512,
            max_missing_items: 1024,
            max_recent_deltas: 256,
            drain_misses_per_tick: 64,
            sample_interval_ticks: 50,
            control_interval_ticks: 10,
        }
    }
}

/// Runtime configuration (spec §6 "Configuration").
pub struct NodeConfig {
    /// This node's identity and AEAD key-derivation input.
    pub identity: NodeIdentity,
    /// Optional extra secret mixed into AEAD key derivation.
    pub gossip_psk: Option<Vec<u8>>,
    /// Rumor-mongering replication factor (default 4).
    pub gossip_fanout: usize,
    /// Resource bounds.
    pub limits: NodeLimits,
}

/// An action the caller must execute: send a sealed packet, or deliver a
/// newly-accepted Deploy to the operator-supplied executor.
///
/// Both variants are `Copy` so pushing into a pre-reserved `Vec` never
/// allocates on the hot path.
#[derive(Debug, Clone, Copy)]
pub enum NodeAction {
    /// Send `packet` (already AEAD-sealed) to `to`.
    SendPacket {
        /// Destination peer.
        to: Peer,
        /// The sealed wire packet.
        packet: Packet,
    },
    /// A Deploy was newly accepted; hand `service` to the executor.
    Deployed {
        /// The service that was accepted.
        service: Service,
    },
}

/// The gossip/replication core for one node.
pub struct Node<R: Rng> {
    identity: NodeIdentity,
    clock: Clock,
    store: ServiceStore,
    services: HashMap<u64, Service>,
    last_seen: HashMap<[u8; 32], u64>,
    miss_queue: MissQueue,
    peer_table: Arc<PeerTable>,
    wal: Wal,
    epoch_keys: EpochKeys,
    metrics: Arc<Metrics>,
    psk: Option<Vec<u8>>,
    fanout: usize,
    limits: NodeLimits,
    rng: R,
    tick_count: u64,
    last_deployed_id: Option<u64>,
    knowledge_height: u64,
}

impl<R: Rng> Node<R> {
    /// Construct a node, replaying `wal` to rebuild the version index a
    /// restart would otherwise lose. Log entries restore `store`'s
    /// `id -> version` knowledge, so the node never re-accepts a Deploy
    /// older than what it durably recorded before a crash; the snapshot
    /// payload (written by a future `Wal::compact` call) is handed to
    /// the same replay, though nothing populates one yet. Full service
    /// bodies for ids recovered only from the log are re-fetched from
    /// peers through the normal digest/miss-queue path, same as any
    /// other knowledge gap.
    #[must_use]
    pub fn new(
        config: NodeConfig,
        peer_table: Arc<PeerTable>,
        mut wal: Wal,
        epoch_keys: EpochKeys,
        metrics: Arc<Metrics>,
        rng: R,
    ) -> Self {
        let limits = config.limits;
        let mut store = ServiceStore::new(limits.max_services, limits.max_recent_deltas);
        let mut knowledge_height = 0u64;
        wal.recover(
            |id, version| {
                let _ = store.update(id, Hlc::from_u64(version));
                knowledge_height += 1;
            },
            |_snapshot| {},
        );
        Self {
            identity: config.identity,
            clock: Clock::new(),
            store,
            services: HashMap::with_capacity(limits.max_services),
            last_seen: HashMap::new(),
            miss_queue: MissQueue::new(limits.max_missing_items),
            peer_table,
            wal,
            epoch_keys,
            metrics,
            psk: config.gossip_psk,
            fanout: config.gossip_fanout,
            limits,
            rng,
            tick_count: 0,
            last_deployed_id: None,
            knowledge_height,
        }
    }

    /// Number of distinct services known.
    #[must_use]
    pub fn services_known(&self) -> usize {
        self.store.count()
    }

    /// Monotonic count of versions durably accepted into the WAL, local
    /// or remote. Unlike [`Node::services_known`] this keeps climbing
    /// when an already-known id is updated again, so it can exceed the
    /// distinct-id count.
    #[must_use]
    pub fn knowledge_height(&self) -> u64 {
        self.knowledge_height
    }

    /// The id of the most recently accepted Deploy, if any.
    #[must_use]
    pub fn last_deployed_id(&self) -> Option<u64> {
        self.last_deployed_id
    }

    /// The version currently stored for `id`, or `0` if unknown.
    #[must_use]
    pub fn get_version(&self, id: u64) -> u64 {
        self.store.get_version(id)
    }

    /// AEAD tag failures observed so far (the only externally visible
    /// traffic error counter, per spec §9).
    #[must_use]
    pub fn packet_mac_failures(&self) -> u64 {
        self.metrics.packet_mac_failures()
    }

    /// The write-ahead log, for a caller that persists its buffers to
    /// disk after processing an action batch.
    #[must_use]
    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    /// When `peer` was last heard from over a Control packet, if ever
    /// (spec §4.7: Control updates a liveness counter, Sync does not).
    #[must_use]
    pub fn last_seen(&self, peer: &[u8; 32]) -> Option<u64> {
        self.last_seen.get(peer).copied()
    }

    fn seal_for(&mut self, peer: Peer, mut packet: Packet) -> Packet {
        let key = myco_crypto::derive_key(
            &self.identity.public_key,
            peer.node_id,
            self.epoch_keys.current_epoch(),
            self.psk.as_deref(),
        );
        let mut random = [0u8; 8];
        self.rng.fill(&mut random);
        seal(&mut packet, &key, self.epoch_keys.current_epoch(), random);
        packet
    }

    /// Build a fresh packet addressed to `dest`. `node_id` is the
    /// *destination's* routing hint (spec §3) - it doubles as the AEAD
    /// key-derivation `dest_id`, so it must match the specific recipient
    /// this packet is sealed for, not the sender's own id.
    fn new_packet(&self, msg_type: MsgType, dest: Peer) -> Packet {
        Packet::new(msg_type, dest.node_id, self.identity.zone_id, self.identity.public_key)
    }

    /// Admin-injected local write (spec §4.7).
    ///
    /// # Errors
    ///
    /// Propagates [`NodeError`] from the HLC, store, or WAL.
    pub fn inject_service(
        &mut self,
        now_ms: u64,
        service: Service,
        actions: &mut Vec<NodeAction>,
    ) -> Result<bool, NodeError> {
        let version = self.clock.next(now_ms)?;
        let changed = self.store.update(service.id(), version)?;
        self.services.insert(service.id(), service);
        self.wal.append(service.id(), version.as_u64())?;
        self.knowledge_height += 1;
        if changed {
            self.rumor_forward(now_ms, service.id(), version, None, actions);
        }
        Ok(changed)
    }

    /// Handle one inbound, already AEAD-decoded-at-the-wire packet: open
    /// its AEAD envelope, then classify and apply by `msg_type`.
    pub fn handle_packet(&mut self, now_ms: u64, from: Peer, mut packet: Packet, actions: &mut Vec<NodeAction>) {
        if let Err(CryptoError::TagMismatch) =
            open(&mut packet, &self.epoch_keys, self.psk.as_deref(), &self.metrics)
        {
            tracing::warn!(peer = from.node_id, "dropping packet: AEAD tag mismatch");
            return;
        }

        match packet.msg_type() {
            Some(MsgType::Deploy) => self.handle_deploy(now_ms, from, &packet, actions),
            Some(MsgType::Request) => self.handle_request(&packet, actions),
            Some(MsgType::Sync) => self.handle_digest(&packet, from),
            Some(MsgType::Control) => {
                self.last_seen.insert(from.public_key, now_ms);
                self.handle_digest(&packet, from);
            },
            None => tracing::warn!(raw = packet.msg_type_raw(), "dropping packet: unknown msg_type"),
        }
    }

    fn handle_deploy(&mut self, now_ms: u64, from: Peer, packet: &Packet, actions: &mut Vec<NodeAction>) {
        let body = packet.payload_bytes();
        if body.len() < 8 + Service::SIZE {
            tracing::warn!("dropping Deploy: payload too short");
            return;
        }
        let Ok(version_bytes) = body[0..8].try_into() else {
            tracing::warn!("dropping Deploy: malformed version prefix");
            return;
        };
        let version_raw = u64::from_le_bytes(version_bytes);
        let Ok((service, _)) = Service::ref_from_prefix(&body[8..8 + Service::SIZE]) else {
            tracing::warn!("dropping Deploy: malformed service body");
            return;
        };
        let service = *service;
        let version = Hlc::from_u64(version_raw);

        let Ok(observed) = self.clock.observe(version, now_ms) else {
            tracing::error!("HLC logical overflow observing remote Deploy");
            return;
        };
        let _ = observed;

        if !newer(version, Hlc::from_u64(self.store.get_version(service.id()))) {
            return;
        }
        match self.store.update(service.id(), version) {
            Ok(true) => {
                self.services.insert(service.id(), service);
                if self.wal.append(service.id(), version.as_u64()).is_err() {
                    tracing::error!(id = service.id(), "WAL append failed for accepted Deploy");
                } else {
                    self.knowledge_height += 1;
                }
                self.last_deployed_id = Some(service.id());
                actions.push(NodeAction::Deployed { service });
                self.rumor_forward(now_ms, service.id(), version, Some(from.public_key), actions);
            },
            Ok(false) => {},
            Err(_) => tracing::warn!(id = service.id(), "service store at capacity, dropping Deploy"),
        }
    }

    fn handle_request(&mut self, packet: &Packet, actions: &mut Vec<NodeAction>) {
        let body = packet.payload_bytes();
        if body.len() < 8 {
            return;
        }
        let Ok(id_bytes) = body[0..8].try_into() else { return };
        let id = u64::from_le_bytes(id_bytes);
        let Some(service) = self.services.get(&id).copied() else { return };
        let version = self.store.get_version(id);
        if let Some(peer) = self.peer_table.find(&packet.sender_pubkey()) {
            self.send_deploy(peer, id, version, service, actions);
        }
    }

    fn handle_digest(&mut self, packet: &Packet, from: Peer) {
        let body = packet.payload_bytes();
        let mut entries = vec![DigestEntry::default(); body.len() / 2 + 1];
        let Ok(count) = digest::decode(body, &mut entries) else {
            tracing::warn!("dropping digest: corrupt");
            return;
        };
        for entry in &entries[..count] {
            if newer(Hlc::from_u64(entry.version), Hlc::from_u64(self.store.get_version(entry.id))) {
                self.miss_queue.push(entry.id, from.public_key, &mut self.rng);
            }
        }
    }

    fn send_deploy(&mut self, peer: Peer, id: u64, version: u64, service: Service, actions: &mut Vec<NodeAction>) {
        let mut packet = self.new_packet(MsgType::Deploy, peer);
        let mut payload = [0u8; Packet::MAX_PAYLOAD];
        payload[0..8].copy_from_slice(&version.to_le_bytes());
        payload[8..8 + Service::SIZE].copy_from_slice(service.as_bytes());
        let _ = id;
        if packet.set_payload(&payload[..8 + Service::SIZE]).is_ok() {
            let sealed = self.seal_for(peer, packet);
            actions.push(NodeAction::SendPacket { to: peer, packet: sealed });
        }
    }

    fn rumor_forward(
        &mut self,
        _now_ms: u64,
        id: u64,
        version: Hlc,
        exclude: Option<[u8; 32]>,
        actions: &mut Vec<NodeAction>,
    ) {
        let Some(service) = self.services.get(&id).copied() else { return };
        let targets = self.peer_table.sample(self.fanout, exclude, &mut self.rng);
        for peer in targets {
            self.send_deploy(peer, id, version.as_u64(), service, actions);
        }
    }

    /// Drain pending misses (up to the configured per-tick limit) and
    /// emit `Request` packets.
    fn drain_misses(&mut self, actions: &mut Vec<NodeAction>) {
        let misses = self.miss_queue.drain(self.limits.drain_misses_per_tick);
        for miss in misses {
            let Some(peer) = self.peer_table.find(&miss.from) else { continue };
            let mut packet = self.new_packet(MsgType::Request, peer);
            if packet.set_payload(&miss.id.to_le_bytes()).is_ok() {
                let sealed = self.seal_for(peer, packet);
                actions.push(NodeAction::SendPacket { to: peer, packet: sealed });
            }
        }
    }

    fn emit_digest(&mut self, msg_type: MsgType, drain_dirty: bool, actions: &mut Vec<NodeAction>) {
        let mut entries = [DigestEntry::default(); 64];
        let n = if drain_dirty {
            self.store.drain_dirty(&mut entries)
        } else {
            self.store.populate_digest(&mut entries, &mut self.rng)
        };
        if n == 0 {
            return;
        }
        let mut buf = [0u8; Packet::MAX_PAYLOAD];
        let Ok(used) = digest::encode(&entries[..n], &mut buf) else { return };

        let targets = self.peer_table.sample(self.fanout, None, &mut self.rng);
        for peer in targets {
            let mut packet = self.new_packet(msg_type, peer);
            if packet.set_payload(&buf[..used]).is_ok() {
                let sealed = self.seal_for(peer, packet);
                actions.push(NodeAction::SendPacket { to: peer, packet: sealed });
            }
        }
    }

    /// Advance one tick: drain misses, then emit scheduled gossip.
    /// Rumor-forwarding of freshly accepted Deploys happens inline inside
    /// [`Node::handle_packet`]/[`Node::inject_service`], not here.
    pub fn tick(&mut self, now_ms: u64, actions: &mut Vec<NodeAction>) {
        let _ = now_ms;
        self.tick_count += 1;

        self.drain_misses(actions);

        if self.store.has_dirty() {
            self.emit_digest(MsgType::Sync, true, actions);
        }
        if self.tick_count % self.limits.sample_interval_ticks == 0 {
            self.emit_digest(MsgType::Sync, false, actions);
        }
        if self.tick_count % self.limits.control_interval_ticks == 0 {
            self.emit_digest(MsgType::Control, true, actions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn default_addr() -> std::net::SocketAddr {
        "0.0.0.0:0".parse().unwrap()
    }

    fn identity(node_id: u16) -> NodeIdentity {
        NodeIdentity { public_key: [node_id as u8; 32], node_id, zone_id: 0 }
    }

    fn make_node(node_id: u16, peers: Vec<Peer>) -> Node<StdRng> {
        let config = NodeConfig {
            identity: identity(node_id),
            gossip_psk: None,
            gossip_fanout: 4,
            limits: NodeLimits::default(),
        };
        let epoch_keys = EpochKeys::new(1, None);
        Node::new(
            config,
            Arc::new(PeerTable::new(peers)),
            Wal::new(64 * 1024, 4096),
            epoch_keys,
            Arc::new(Metrics::default()),
            StdRng::seed_from_u64(node_id.into()),
        )
    }

    #[test]
    fn inject_service_marks_dirty_and_is_retrievable() {
        let mut node = make_node(1, vec![]);
        let mut actions = Vec::new();
        let svc = Service::new(999, "hello", "flake:hello", "hello");
        let changed = node.inject_service(1000, svc, &mut actions).unwrap();
        assert!(changed);
        assert_eq!(node.services_known(), 1);
    }

    #[test]
    fn construction_replays_a_pre_populated_wal_into_the_version_index() {
        let mut wal = Wal::new(64 * 1024, 4096);
        wal.append(1, Hlc::pack(5_000, 0).as_u64()).unwrap();
        wal.append(2, Hlc::pack(5_001, 0).as_u64()).unwrap();

        let config = NodeConfig {
            identity: identity(1),
            gossip_psk: None,
            gossip_fanout: 4,
            limits: NodeLimits::default(),
        };
        let node = Node::new(
            config,
            Arc::new(PeerTable::new(vec![])),
            wal,
            EpochKeys::new(1, None),
            Arc::new(Metrics::default()),
            StdRng::seed_from_u64(1),
        );

        assert_eq!(node.get_version(1), Hlc::pack(5_000, 0).as_u64());
        assert_eq!(node.get_version(2), Hlc::pack(5_001, 0).as_u64());
    }

    #[test]
    fn two_node_handover_via_direct_deploy() {
        let peer_b = Peer { public_key: [2u8; 32], node_id: 2, addr: default_addr() };
        let mut a = make_node(1, vec![peer_b]);
        let peer_a = Peer { public_key: [1u8; 32], node_id: 1, addr: default_addr() };
        let mut b = make_node(2, vec![peer_a]);

        let mut actions = Vec::new();
        let svc = Service::new(999, "hello", "flake:hello", "hello");
        a.inject_service(100, svc, &mut actions).unwrap();

        assert!(!actions.is_empty());
        for action in actions.drain(..) {
            if let NodeAction::SendPacket { packet, .. } = action {
                let mut incoming = Vec::new();
                b.handle_packet(101, peer_a, packet, &mut incoming);
            }
        }
        assert_eq!(b.get_version(999), a.get_version(999));
    }

    #[test]
    fn control_packets_update_last_seen_but_sync_packets_do_not() {
        let peer_b = Peer { public_key: [2u8; 32], node_id: 2, addr: default_addr() };
        let mut a = make_node(1, vec![peer_b]);
        let peer_a = Peer { public_key: [1u8; 32], node_id: 1, addr: default_addr() };
        let mut b = make_node(2, vec![peer_a]);

        let mut setup = Vec::new();
        let svc = Service::new(999, "hello", "flake:hello", "hello");
        a.inject_service(100, svc, &mut setup).unwrap();

        let mut sync_actions = Vec::new();
        a.emit_digest(MsgType::Sync, false, &mut sync_actions);
        let sync_packet = sync_actions.into_iter().find_map(|action| match action {
            NodeAction::SendPacket { packet, .. } => Some(packet),
            NodeAction::Deployed { .. } => None,
        });
        let sync_packet = sync_packet.expect("a sample digest should be emitted for a known service");

        let mut incoming = Vec::new();
        b.handle_packet(200, peer_a, sync_packet, &mut incoming);
        assert_eq!(b.last_seen(&peer_a.public_key), None, "Sync must not update liveness");

        let mut control_actions = Vec::new();
        a.emit_digest(MsgType::Control, false, &mut control_actions);
        let control_packet = control_actions.into_iter().find_map(|action| match action {
            NodeAction::SendPacket { packet, .. } => Some(packet),
            NodeAction::Deployed { .. } => None,
        });
        let control_packet = control_packet.expect("a sample digest should be emitted for a known service");

        b.handle_packet(201, peer_a, control_packet, &mut incoming);
        assert_eq!(b.last_seen(&peer_a.public_key), Some(201), "Control must update liveness to the processing time");
    }

    #[test]
    fn knowledge_height_tracks_versions_accepted_past_distinct_ids() {
        let mut node = make_node(1, vec![]);
        let mut actions = Vec::new();
        let svc = Service::new(1, "nginx", "flake:nginx", "nginx");
        node.inject_service(1_000, svc, &mut actions).unwrap();
        assert_eq!(node.knowledge_height(), 1);
        assert_eq!(node.services_known(), 1);

        let svc_again = Service::new(1, "nginx", "flake:nginx", "nginx");
        node.inject_service(1_001, svc_again, &mut actions).unwrap();
        assert_eq!(node.knowledge_height(), 2, "a repeat id still advances knowledge height");
        assert_eq!(node.services_known(), 1, "but the distinct-id count stays the same");
    }
}
