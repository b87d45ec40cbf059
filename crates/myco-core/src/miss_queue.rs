//! Fixed-capacity set of ids a node has learned exist but does not yet
//! hold. Overflow evicts a uniformly-random existing element (not FIFO)
//! so ids advertised during a burst aren't systematically starved.

use rand::Rng;

/// A peer advertisement for a missing id: which id, and who to ask
/// (identified by public key, the peer table's primary key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Miss {
    /// The id we don't yet hold a current version for.
    pub id: u64,
    /// The public key of the peer that last advertised this id.
    pub from: [u8; 32],
}

/// Fixed-capacity, random-replacement miss tracker.
pub struct MissQueue {
    capacity: usize,
    entries: Vec<Miss>,
}

impl MissQueue {
    /// Build an empty queue with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::with_capacity(capacity) }
    }

    /// Record that `id` is missing, last advertised by `from`. If `id` is
    /// already queued, its advertiser is refreshed in place. On overflow,
    /// a uniformly-random existing entry is evicted to make room.
    pub fn push(&mut self, id: u64, from: [u8; 32], rng: &mut impl Rng) {
        if let Some(existing) = self.entries.iter_mut().find(|m| m.id == id) {
            existing.from = from;
            return;
        }
        if self.entries.len() >= self.capacity {
            let victim = rng.gen_range(0..self.entries.len());
            self.entries.swap_remove(victim);
        }
        self.entries.push(Miss { id, from });
    }

    /// Drain up to `max` pending misses.
    pub fn drain(&mut self, max: usize) -> Vec<Miss> {
        let n = max.min(self.entries.len());
        self.entries.drain(..n).collect()
    }

    /// Number of ids currently tracked as missing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
