//! Multi-node simulated cluster: owns one [`Node`] per simulated peer,
//! a virtual clock, and a [`SimNetwork`] it routes outbound packets
//! through.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use myco_core::{Node, NodeAction, NodeConfig, NodeIdentity, NodeLimits, Peer, PeerTable, Wal};
use myco_crypto::{EpochKeys, Metrics};
use myco_proto::Service;
use rand::{rngs::StdRng, SeedableRng};

use crate::network::SimNetwork;

/// Tunables for building a [`TestCluster`].
#[derive(Debug, Clone, Copy)]
pub struct ClusterConfig {
    /// Number of simulated nodes, fully connected.
    pub node_count: usize,
    /// Per-packet drop probability, `[0, 1)`.
    pub loss_rate: f64,
    /// Seed driving both the network's loss decisions and every node's
    /// own RNG (each node gets `seed + node_index` so runs are
    /// reproducible but nodes don't share a stream).
    pub seed: u64,
    /// Rumor-mongering fanout passed to every node.
    pub gossip_fanout: usize,
    /// Milliseconds advanced per simulated tick.
    pub tick_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { node_count: 5, loss_rate: 0.0, seed: 1, gossip_fanout: 4, tick_ms: 1000 }
    }
}

fn identity_for(index: usize) -> NodeIdentity {
    let node_id = (index + 1) as u16;
    let mut public_key = [0u8; 32];
    public_key[0..2].copy_from_slice(&node_id.to_le_bytes());
    NodeIdentity { public_key, node_id, zone_id: 0 }
}

fn addr_for(index: usize) -> SocketAddr {
    format!("127.0.0.1:{}", 20_000 + index).parse().expect("valid loopback address")
}

/// A fully-connected simulated cluster of gossiping nodes.
pub struct TestCluster {
    nodes: Vec<Node<StdRng>>,
    identities: Vec<NodeIdentity>,
    index_by_node_id: HashMap<u16, usize>,
    network: SimNetwork,
    net_rng: StdRng,
    now_ms: u64,
    tick_ms: u64,
}

impl TestCluster {
    /// Build a fully-connected cluster: every node's peer table lists
    /// every other node.
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        let identities: Vec<NodeIdentity> = (0..config.node_count).map(identity_for).collect();
        let mut index_by_node_id = HashMap::new();
        for (i, id) in identities.iter().enumerate() {
            index_by_node_id.insert(id.node_id, i);
        }

        let nodes = (0..config.node_count)
            .map(|i| {
                let me = identities[i];
                let peers: Vec<Peer> = identities
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(j, id)| Peer { public_key: id.public_key, node_id: id.node_id, addr: addr_for(j) })
                    .collect();

                let node_config = NodeConfig {
                    identity: me,
                    gossip_psk: None,
                    gossip_fanout: config.gossip_fanout,
                    limits: NodeLimits::default(),
                };
                Node::new(
                    node_config,
                    Arc::new(PeerTable::new(peers)),
                    Wal::new(256 * 1024, 32 * 1024),
                    EpochKeys::new(1, None),
                    Arc::new(Metrics::default()),
                    StdRng::seed_from_u64(config.seed.wrapping_add(i as u64)),
                )
            })
            .collect();

        Self {
            nodes,
            identities,
            index_by_node_id,
            network: SimNetwork::new(config.loss_rate),
            net_rng: StdRng::seed_from_u64(config.seed ^ 0xD15E_A5E),
            now_ms: 0,
            tick_ms: config.tick_ms,
        }
    }

    /// Number of simulated nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the cluster has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current virtual time, in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Read-only access to one node, for assertions.
    #[must_use]
    pub fn node(&self, index: usize) -> &Node<StdRng> {
        &self.nodes[index]
    }

    fn route(&mut self, from_index: usize, actions: Vec<NodeAction>) {
        for action in actions {
            match action {
                NodeAction::SendPacket { to, packet } => {
                    if !self.network.delivers(&mut self.net_rng) {
                        continue;
                    }
                    let Some(&dest_index) = self.index_by_node_id.get(&to.node_id) else { continue };
                    let from_peer = Peer {
                        public_key: self.identities[from_index].public_key,
                        node_id: self.identities[from_index].node_id,
                        addr: addr_for(from_index),
                    };
                    let mut delivered = Vec::new();
                    self.nodes[dest_index].handle_packet(self.now_ms, from_peer, packet, &mut delivered);
                    // Recursively route anything the receiving node emitted
                    // inline while handling this packet (rumor forwards,
                    // request replies).
                    self.route(dest_index, delivered);
                },
                NodeAction::Deployed { .. } => {},
            }
        }
    }

    /// Advance every node one tick: drain misses, emit scheduled gossip,
    /// and route anything produced through the network.
    pub fn step(&mut self) {
        self.now_ms += self.tick_ms;
        for i in 0..self.nodes.len() {
            let mut actions = Vec::new();
            self.nodes[i].tick(self.now_ms, &mut actions);
            self.route(i, actions);
        }
    }

    /// Advance `n` ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Have node `origin` locally inject `service` (spec §4.7), routing
    /// whatever it sends immediately.
    ///
    /// # Panics
    ///
    /// Panics if the node rejects the injection (HLC/store/WAL error) -
    /// that would indicate a harness misconfiguration, not an expected
    /// outcome for these tests.
    pub fn inject(&mut self, origin: usize, service: Service) {
        self.now_ms += self.tick_ms;
        let mut actions = Vec::new();
        self.nodes[origin]
            .inject_service(self.now_ms, service, &mut actions)
            .expect("inject_service should succeed in a freshly built test cluster");
        self.route(origin, actions);
    }

    /// Whether every node reports the same count of known services.
    #[must_use]
    pub fn converged_on_count(&self, expected: usize) -> bool {
        self.nodes.iter().all(|n| n.services_known() == expected)
    }

    /// Whether every node that has heard of `id` agrees on its version.
    #[must_use]
    pub fn converged_on_version(&self, id: u64) -> bool {
        let versions: Vec<u64> =
            self.nodes.iter().map(|n| n.get_version(id)).filter(|&v| v != 0).collect();
        versions.windows(2).all(|w| w[0] == w[1])
    }

    /// The node identity at `index`, for constructing expected peers.
    #[must_use]
    pub fn identity(&self, index: usize) -> NodeIdentity {
        self.identities[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_node_cluster_converges_within_20_ticks_at_zero_loss() {
        let mut cluster = TestCluster::new(ClusterConfig { node_count: 2, ..Default::default() });
        cluster.inject(0, Service::new(999, "hello", "flake:hello", "hello"));
        cluster.run(20);
        assert!(cluster.converged_on_version(999));
        assert_eq!(cluster.node(1).get_version(999), cluster.node(0).get_version(999));
    }

    #[test]
    fn five_node_cluster_eventually_knows_every_injection() {
        let mut cluster = TestCluster::new(ClusterConfig { node_count: 5, ..Default::default() });
        for i in 0..10u64 {
            cluster.inject((i % 5) as usize, Service::new(i, "svc", "flake:x", "x"));
            cluster.run(5);
        }
        cluster.run(200);
        assert!(cluster.converged_on_count(10));
    }
}
