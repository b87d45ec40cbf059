//! Scenario S3 (spec §8 Property 7): gossip still converges eventually
//! over a lossy network, given enough ticks and a non-saturating drop
//! rate.

use myco_harness::{invariants::BoundedCapacities, ClusterConfig, InvariantRegistry, TestCluster};
use myco_proto::Service;

#[test]
fn s3_convergence_survives_thirty_percent_packet_loss() {
    let mut cluster =
        TestCluster::new(ClusterConfig { node_count: 6, loss_rate: 0.3, seed: 42, ..Default::default() });

    for i in 0..6u64 {
        cluster.inject(i as usize, Service::new(i, "svc", "flake:svc", "svc"));
    }
    // Lossy gossip needs more rounds than the reliable-network case to
    // reach every node; 500 ticks is generous headroom at fanout 4.
    cluster.run(500);

    assert!(cluster.converged_on_count(6), "cluster failed to converge under 30% loss");
    for i in 0..6u64 {
        assert!(cluster.converged_on_version(i));
    }
}

#[test]
fn bounded_capacities_hold_throughout_a_lossy_run() {
    let mut cluster =
        TestCluster::new(ClusterConfig { node_count: 4, loss_rate: 0.2, seed: 7, ..Default::default() });
    let registry = InvariantRegistry::new().with(BoundedCapacities::new(512));

    for i in 0..20u64 {
        cluster.inject((i % 4) as usize, Service::new(i, "svc", "flake:svc", "svc"));
        cluster.run(3);
        let violations = registry.check_all(&cluster);
        assert!(violations.is_empty(), "{violations:?}");
    }
}
