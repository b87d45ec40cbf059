//! Identity and peer table (spec §9): keyed by 32-byte public key,
//! mutated only between ticks, read lock-free by the transport thread.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use rand::{seq::SliceRandom, Rng};

/// A node's identity: its public key (used to derive AEAD keys) plus its
/// zone hint.
#[derive(Debug, Clone, Copy)]
pub struct NodeIdentity {
    /// 32-byte public key, also used as the AEAD key-derivation input.
    pub public_key: [u8; 32],
    /// Destination id advertised in outbound packets.
    pub node_id: u16,
    /// Zone/shard hint.
    pub zone_id: u8,
}

/// One entry in the peer table.
#[derive(Debug, Clone, Copy)]
pub struct Peer {
    /// The peer's public key.
    pub public_key: [u8; 32],
    /// The peer's destination id (for AEAD key derivation and routing).
    pub node_id: u16,
    /// Where to send datagrams.
    pub addr: SocketAddr,
}

/// Snapshot-swapped peer table.
///
/// The transport thread holds a cheap `Arc` clone of the current
/// snapshot and never blocks on the Node; the Node mutates the table only
/// between ticks by building a new `Vec<Peer>` and swapping it in, so
/// readers always see a complete, consistent view.
pub struct PeerTable {
    current: Mutex<Arc<Vec<Peer>>>,
}

impl PeerTable {
    /// Build a peer table from an initial peer list.
    #[must_use]
    pub fn new(peers: Vec<Peer>) -> Self {
        Self { current: Mutex::new(Arc::new(peers)) }
    }

    /// A cheap, consistent snapshot of the current peer list.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Peer>> {
        Arc::clone(&self.current.lock().expect("peer table mutex poisoned"))
    }

    /// Replace the peer table wholesale. Called only between ticks.
    pub fn replace(&self, peers: Vec<Peer>) {
        *self.current.lock().expect("peer table mutex poisoned") = Arc::new(peers);
    }

    /// Choose up to `count` distinct peers uniformly at random, excluding
    /// `exclude_pubkey` if given (e.g. the sender of a rumor, so it isn't
    /// forwarded back to itself).
    pub fn sample(&self, count: usize, exclude_pubkey: Option<[u8; 32]>, rng: &mut impl Rng) -> Vec<Peer> {
        let snapshot = self.snapshot();
        let mut candidates: Vec<Peer> =
            snapshot.iter().filter(|p| Some(p.public_key) != exclude_pubkey).copied().collect();
        candidates.shuffle(rng);
        candidates.truncate(count);
        candidates
    }

    /// Find a peer by its public key (the primary key per the spec's
    /// peer-table design; used both for request/miss repair lookups and
    /// to resolve an inbound datagram's sender).
    #[must_use]
    pub fn find(&self, public_key: &[u8; 32]) -> Option<Peer> {
        self.snapshot().iter().find(|p| &p.public_key == public_key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn peer(node_id: u16) -> Peer {
        Peer { public_key: [node_id as u8; 32], node_id, addr: "127.0.0.1:9000".parse().unwrap() }
    }

    #[test]
    fn sample_excludes_given_node_and_respects_count() {
        let table = PeerTable::new(vec![peer(1), peer(2), peer(3), peer(4)]);
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = table.sample(2, Some([1u8; 32]), &mut rng);
        assert_eq!(sampled.len(), 2);
        assert!(sampled.iter().all(|p| p.node_id != 1));
    }

    #[test]
    fn replace_is_visible_to_subsequent_snapshots() {
        let table = PeerTable::new(vec![peer(1)]);
        table.replace(vec![peer(2), peer(3)]);
        let snap = table.snapshot();
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn find_locates_peer_by_public_key() {
        let table = PeerTable::new(vec![peer(5), peer(6)]);
        assert!(table.find(&[6u8; 32]).is_some());
        assert!(table.find(&[99u8; 32]).is_none());
    }
}
