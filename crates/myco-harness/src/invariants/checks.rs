//! Concrete invariants over a [`crate::TestCluster`] (spec §8 "Convergence
//! properties", "Bounded memory").

use std::{cell::RefCell, collections::HashMap};

use crate::TestCluster;

use super::Invariant;

/// Every node that knows about any of `ids` agrees with every other node
/// that knows about it (spec §8 Property 1 "eventual convergence" /
/// Property 2 "single-writer convergence", checked post-quiescence).
pub struct SingleWriterConvergence {
    ids: Vec<u64>,
}

impl SingleWriterConvergence {
    /// Track convergence for exactly these ids.
    #[must_use]
    pub fn new(ids: Vec<u64>) -> Self {
        Self { ids }
    }
}

impl Invariant for SingleWriterConvergence {
    fn name(&self) -> &'static str {
        "single_writer_convergence"
    }

    fn check(&self, cluster: &TestCluster) -> Option<String> {
        for &id in &self.ids {
            if !cluster.converged_on_version(id) {
                return Some(format!("nodes disagree on version for id {id}"));
            }
        }
        None
    }
}

/// Every node's stored version for `id`, once non-zero, never regresses
/// across successive checks (spec §8 Property 3 "last-write-wins";
/// applying an older version must never overwrite a newer one).
pub struct LwwConsistency {
    id: u64,
    last_seen: RefCell<HashMap<usize, u64>>,
}

impl LwwConsistency {
    /// Watch `id` for regressions across repeated [`Invariant::check`] calls.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, last_seen: RefCell::new(HashMap::new()) }
    }
}

impl Invariant for LwwConsistency {
    fn name(&self) -> &'static str {
        "lww_consistency"
    }

    fn check(&self, cluster: &TestCluster) -> Option<String> {
        let mut last_seen = self.last_seen.borrow_mut();
        for index in 0..cluster.len() {
            let version = cluster.node(index).get_version(self.id);
            if version == 0 {
                continue;
            }
            if let Some(&previous) = last_seen.get(&index) {
                if version < previous {
                    return Some(format!(
                        "node {index} version for id {} regressed from {previous} to {version}",
                        self.id
                    ));
                }
            }
            last_seen.insert(index, version);
        }
        None
    }
}

/// Every node's HLC-derived version for `id` only ever moves forward
/// across successive checks, across every id the caller asks about
/// (spec §8 Property 4 "HLC monotonicity"). Unlike [`LwwConsistency`]
/// this watches every node/id pair it has ever seen, not just one id.
#[derive(Default)]
pub struct HlcMonotonic {
    watch_ids: Vec<u64>,
    last_seen: RefCell<HashMap<(usize, u64), u64>>,
}

impl HlcMonotonic {
    /// Watch every id in `watch_ids` across all nodes.
    #[must_use]
    pub fn new(watch_ids: Vec<u64>) -> Self {
        Self { watch_ids, last_seen: RefCell::new(HashMap::new()) }
    }
}

impl Invariant for HlcMonotonic {
    fn name(&self) -> &'static str {
        "hlc_monotonic"
    }

    fn check(&self, cluster: &TestCluster) -> Option<String> {
        let mut last_seen = self.last_seen.borrow_mut();
        for index in 0..cluster.len() {
            for &id in &self.watch_ids {
                let version = cluster.node(index).get_version(id);
                if version == 0 {
                    continue;
                }
                let key = (index, id);
                if let Some(&previous) = last_seen.get(&key) {
                    if version < previous {
                        return Some(format!(
                            "node {index} HLC version for id {id} went backwards: {previous} -> {version}"
                        ));
                    }
                }
                last_seen.insert(key, version);
            }
        }
        None
    }
}

/// No node's store exceeds its configured capacity (spec §5 "Bounded
/// memory"). `max_services` should match the `NodeLimits::max_services`
/// the cluster's nodes were built with.
pub struct BoundedCapacities {
    max_services: usize,
}

impl BoundedCapacities {
    /// Bound every node's known-service count at `max_services`.
    #[must_use]
    pub fn new(max_services: usize) -> Self {
        Self { max_services }
    }
}

impl Invariant for BoundedCapacities {
    fn name(&self) -> &'static str {
        "bounded_capacities"
    }

    fn check(&self, cluster: &TestCluster) -> Option<String> {
        for index in 0..cluster.len() {
            let known = cluster.node(index).services_known();
            if known > self.max_services {
                return Some(format!("node {index} holds {known} services, exceeding cap {}", self.max_services));
            }
        }
        None
    }
}
