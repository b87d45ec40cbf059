//! The CRDT service store: `id -> version` map with last-write-wins
//! semantics, a dirty buffer for delta digests, and reservoir sampling for
//! cold-start digests.

use std::collections::HashMap;

use myco_proto::DigestEntry;
use rand::Rng;

use crate::{error::StoreError, hlc::Hlc};

/// `id -> version` map, bounded at construction, with a bounded dirty
/// ring used to build delta digests.
pub struct ServiceStore {
    capacity: usize,
    versions: HashMap<u64, Hlc>,
    dirty: Vec<DigestEntry>,
    dirty_capacity: usize,
}

impl ServiceStore {
    /// Build a store with fixed `capacity` distinct ids and a dirty ring
    /// holding up to `dirty_capacity` recent updates.
    #[must_use]
    pub fn new(capacity: usize, dirty_capacity: usize) -> Self {
        Self {
            capacity,
            versions: HashMap::with_capacity(capacity),
            dirty: Vec::with_capacity(dirty_capacity),
            dirty_capacity,
        }
    }

    /// Apply an incoming `(id, version)`. Inserts if `id` is new and the
    /// store has room; replaces only if `version` is newer than what's
    /// stored (last-write-wins). Appends to the dirty ring on any change.
    ///
    /// # Errors
    ///
    /// [`StoreError::CapacityExhausted`] if `id` is new and the store is
    /// already at `capacity`.
    pub fn update(&mut self, id: u64, version: Hlc) -> Result<bool, StoreError> {
        match self.versions.get(&id) {
            Some(&current) if !(version > current) => Ok(false),
            Some(_) => {
                self.versions.insert(id, version);
                self.push_dirty(id, version);
                Ok(true)
            },
            None => {
                if self.versions.len() >= self.capacity {
                    return Err(StoreError::CapacityExhausted);
                }
                self.versions.insert(id, version);
                self.push_dirty(id, version);
                Ok(true)
            },
        }
    }

    fn push_dirty(&mut self, id: u64, version: Hlc) {
        if self.dirty.len() >= self.dirty_capacity {
            self.dirty.remove(0);
        }
        self.dirty.push(DigestEntry { id, version: version.as_u64() });
    }

    /// The currently stored version for `id`, or `0` if absent.
    #[must_use]
    pub fn get_version(&self, id: u64) -> u64 {
        self.versions.get(&id).map_or(0, |v| v.as_u64())
    }

    /// Number of distinct ids stored.
    #[must_use]
    pub fn count(&self) -> usize {
        self.versions.len()
    }

    /// Whether the dirty ring has pending entries.
    #[must_use]
    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Move up to `out.len()` oldest dirty entries into `out`, returning
    /// how many were drained. Remaining entries shift to the front.
    pub fn drain_dirty(&mut self, out: &mut [DigestEntry]) -> usize {
        let n = out.len().min(self.dirty.len());
        for (slot, entry) in out.iter_mut().zip(self.dirty.drain(..n)) {
            *slot = entry;
        }
        n
    }

    /// Reservoir-sample (Algorithm R) up to `out.len()` existing entries
    /// into `out`, without allocation, returning how many were written.
    pub fn populate_digest(&self, out: &mut [DigestEntry], rng: &mut impl Rng) -> usize {
        let mut filled = 0usize;
        for (seen, (&id, &version)) in self.versions.iter().enumerate() {
            if filled < out.len() {
                out[filled] = DigestEntry { id, version: version.as_u64() };
                filled += 1;
            } else {
                let j = rng.gen_range(0..=seen);
                if j < out.len() {
                    out[j] = DigestEntry { id, version: version.as_u64() };
                }
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn insert_then_lww_replace() {
        let mut store = ServiceStore::new(8, 8);
        assert!(store.update(1, Hlc::pack(100, 0)).unwrap());
        assert_eq!(store.get_version(1), Hlc::pack(100, 0).as_u64());
        assert!(store.update(1, Hlc::pack(100, 5)).unwrap());
        assert_eq!(store.get_version(1), Hlc::pack(100, 5).as_u64());
        // older version is rejected
        assert!(!store.update(1, Hlc::pack(50, 0)).unwrap());
        assert_eq!(store.get_version(1), Hlc::pack(100, 5).as_u64());
    }

    #[test]
    fn same_version_is_not_an_update() {
        let mut store = ServiceStore::new(8, 8);
        assert!(store.update(1, Hlc::pack(100, 0)).unwrap());
        assert!(!store.update(1, Hlc::pack(100, 0)).unwrap());
    }

    #[test]
    fn capacity_exhausted_on_new_id_when_full() {
        let mut store = ServiceStore::new(1, 8);
        store.update(1, Hlc::pack(1, 0)).unwrap();
        assert_eq!(store.update(2, Hlc::pack(1, 0)), Err(StoreError::CapacityExhausted));
    }

    #[test]
    fn dirty_ring_drops_oldest_on_overflow() {
        let mut store = ServiceStore::new(8, 2);
        store.update(1, Hlc::pack(1, 0)).unwrap();
        store.update(2, Hlc::pack(1, 0)).unwrap();
        store.update(3, Hlc::pack(1, 0)).unwrap();
        let mut out = [DigestEntry::default(); 8];
        let n = store.drain_dirty(&mut out);
        assert_eq!(n, 2);
        assert_eq!(out[0].id, 2);
        assert_eq!(out[1].id, 3);
    }

    #[test]
    fn reservoir_sample_never_exceeds_output_or_store_size() {
        let mut store = ServiceStore::new(100, 8);
        let mut rng = StdRng::seed_from_u64(42);
        for i in 0..50 {
            store.update(i, Hlc::pack(1, 0)).unwrap();
        }
        let mut out = [DigestEntry::default(); 10];
        let n = store.populate_digest(&mut out, &mut rng);
        assert_eq!(n, 10);
    }
}
