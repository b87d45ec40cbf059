//! Scenario S1/S2 (spec §8): two-node direct handover and concurrent
//! conflicting writes resolved by last-write-wins.

use myco_harness::{invariants::SingleWriterConvergence, ClusterConfig, InvariantRegistry, TestCluster};
use myco_proto::Service;

#[test]
fn s1_two_node_direct_handover_converges() {
    let mut cluster = TestCluster::new(ClusterConfig { node_count: 2, ..Default::default() });
    cluster.inject(0, Service::new(1, "nginx", "flake:nginx", "nginx"));
    cluster.run(10);

    let registry = InvariantRegistry::new().with(SingleWriterConvergence::new(vec![1]));
    let violations = registry.check_all(&cluster);
    assert!(violations.is_empty(), "{violations:?}");
    assert_eq!(cluster.node(1).get_version(1), cluster.node(0).get_version(1));
}

#[test]
fn s2_concurrent_conflicting_writes_resolve_by_lww_not_loss() {
    // Two different origins deploy distinct services; both must survive
    // and converge cluster-wide, since they never touch the same id.
    let mut cluster = TestCluster::new(ClusterConfig { node_count: 3, ..Default::default() });
    cluster.inject(0, Service::new(10, "a", "flake:a", "a"));
    cluster.inject(1, Service::new(11, "b", "flake:b", "b"));
    cluster.run(30);

    assert!(cluster.converged_on_count(2));
    assert!(cluster.converged_on_version(10));
    assert!(cluster.converged_on_version(11));
}

#[test]
fn s2_same_id_racing_writes_keep_the_newer_hlc_version_everywhere() {
    // Both origins write id 20; whichever lands with the higher HLC
    // timestamp must be what every node converges on - no split brain.
    let mut cluster = TestCluster::new(ClusterConfig { node_count: 4, ..Default::default() });
    cluster.inject(0, Service::new(20, "first", "flake:first", "first"));
    cluster.inject(1, Service::new(20, "second", "flake:second", "second"));
    cluster.run(30);

    assert!(cluster.converged_on_version(20));
    let agreed_version = cluster.node(0).get_version(20);
    for i in 1..cluster.len() {
        assert_eq!(cluster.node(i).get_version(20), agreed_version);
    }
}
