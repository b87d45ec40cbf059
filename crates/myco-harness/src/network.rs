//! In-process lossy network: decides, for each packet a simulated node
//! tries to send, whether it is delivered or dropped.
//!
//! This is deliberately the whole "transport" for the simulator - no
//! sockets, no serialization beyond what [`myco_proto::Packet`] already
//! does, no jitter model (spec §1 leaves the jitter *distribution* to the
//! caller; [`TestCluster`](crate::TestCluster) only needs bounded loss to
//! drive spec §8 Property 7/Scenario S3).

use rand::Rng;

/// Independently drops each packet with probability `loss_rate`.
#[derive(Debug, Clone, Copy)]
pub struct SimNetwork {
    loss_rate: f64,
}

impl SimNetwork {
    /// Build a network with a fixed per-packet loss probability in `[0,
    /// 1)`. `loss_rate >= 1.0` would drop everything, which the spec's
    /// convergence property explicitly excludes (`p < 1`); callers should
    /// keep below that.
    #[must_use]
    pub fn new(loss_rate: f64) -> Self {
        Self { loss_rate: loss_rate.clamp(0.0, 0.999_999) }
    }

    /// A lossless network: every packet is delivered.
    #[must_use]
    pub fn reliable() -> Self {
        Self::new(0.0)
    }

    /// Decide whether one packet survives transit.
    pub fn delivers(&self, rng: &mut impl Rng) -> bool {
        if self.loss_rate <= 0.0 {
            return true;
        }
        rng.gen::<f64>() >= self.loss_rate
    }

    /// The configured loss rate.
    #[must_use]
    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn reliable_network_never_drops() {
        let net = SimNetwork::reliable();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(net.delivers(&mut rng));
        }
    }

    #[test]
    fn fully_lossy_rate_is_clamped_below_one() {
        let net = SimNetwork::new(1.0);
        let mut rng = StdRng::seed_from_u64(1);
        // clamped below 1.0, so some packets must eventually get through
        assert!((0..10_000).any(|_| net.delivers(&mut rng)));
    }

    #[test]
    fn roughly_matches_configured_rate_over_many_samples() {
        let net = SimNetwork::new(0.25);
        let mut rng = StdRng::seed_from_u64(42);
        let delivered = (0..20_000).filter(|_| net.delivers(&mut rng)).count();
        let rate = 1.0 - (delivered as f64 / 20_000.0);
        assert!((rate - 0.25).abs() < 0.02, "observed loss rate {rate}");
    }
}
