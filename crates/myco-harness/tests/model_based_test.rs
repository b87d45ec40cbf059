//! Property-based model test: for any sequence of injections across a
//! small cluster, HLC versions never regress and the cluster eventually
//! converges once gossip has had time to run (spec §8 Properties 2-4).

use myco_harness::{
    invariants::{BoundedCapacities, HlcMonotonic},
    ClusterConfig, InvariantRegistry, TestCluster,
};
use myco_proto::Service;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_injection_sequences_never_violate_monotonicity_or_capacity(
        origins in prop::collection::vec(0usize..4, 1..12),
        loss_rate in 0.0f64..0.4,
        seed in any::<u64>(),
    ) {
        let mut cluster = TestCluster::new(ClusterConfig {
            node_count: 4,
            loss_rate,
            seed,
            ..Default::default()
        });

        let ids: Vec<u64> = (0..origins.len() as u64).collect();
        let registry = InvariantRegistry::new()
            .with(HlcMonotonic::new(ids.clone()))
            .with(BoundedCapacities::new(512));

        for (i, &origin) in origins.iter().enumerate() {
            cluster.inject(origin, Service::new(i as u64, "svc", "flake:svc", "svc"));
            cluster.run(2);
            let violations = registry.check_all(&cluster);
            prop_assert!(violations.is_empty(), "{:?}", violations);
        }

        cluster.run(300);
        prop_assert!(cluster.converged_on_count(origins.len()));
    }
}
