//! Admin surface handlers (spec §6): plain functions over `&Node`/
//! `&mut Node`, with no HTTP/UDS framing attached — that framing is an
//! explicitly out-of-scope external collaborator (see `DESIGN.md`). A
//! caller wiring this up over HTTP would route `GET /metrics` to
//! [`metrics_text`] and `POST /deploy` to [`handle_deploy`], checking
//! [`authorized`] against the request's bearer token first.

use myco_core::{Node, NodeAction};
use myco_proto::Service;
use rand::Rng;
use zerocopy::FromBytes;

use crate::config::Config;

/// Render the `GET /metrics` text body (spec §6): `node_id`,
/// `knowledge_height`, `services_known`, `last_deployed`,
/// `packet_mac_failures`.
pub fn metrics_text<R: Rng>(node_id: u16, node: &Node<R>) -> String {
    format!(
        "node_id {node_id}\nknowledge_height {}\nservices_known {}\nlast_deployed {}\npacket_mac_failures {}\n",
        node.knowledge_height(),
        node.services_known(),
        node.last_deployed_id().map_or_else(|| "none".to_string(), |id| id.to_string()),
        node.packet_mac_failures(),
    )
}

/// Outcome of a `POST /deploy` admin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The service was newly accepted (or a newer version of an
    /// already-known one).
    Deployed {
        /// The deployed service's id.
        id: u64,
    },
    /// The body decoded to a version that is not newer than what's
    /// already stored.
    AlreadyUpToDate,
    /// The request body was not exactly `size_of::<Service>()` bytes.
    BadSize {
        /// Bytes expected.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },
}

/// Handle `POST /deploy`: `body` must be exactly `size_of::<Service>()`
/// bytes (spec §6). Injects into `node` as a local write (spec §4.7).
///
/// # Errors
///
/// Propagates [`myco_core::NodeError`] from the HLC/store/WAL, the same
/// fatal-class failures [`Node::inject_service`] can return.
pub fn handle_deploy<R: Rng>(
    node: &mut Node<R>,
    now_ms: u64,
    body: &[u8],
    actions: &mut Vec<NodeAction>,
) -> Result<DeployOutcome, myco_core::NodeError> {
    if body.len() != Service::SIZE {
        return Ok(DeployOutcome::BadSize { expected: Service::SIZE, actual: body.len() });
    }
    let Ok((service, _)) = Service::ref_from_prefix(body) else {
        return Ok(DeployOutcome::BadSize { expected: Service::SIZE, actual: body.len() });
    };
    let service = *service;
    let id = service.id();
    let changed = node.inject_service(now_ms, service, actions)?;
    Ok(if changed { DeployOutcome::Deployed { id } } else { DeployOutcome::AlreadyUpToDate })
}

/// Check a presented bearer token against `config`'s `auth_token`/
/// `auth_token_prev` (spec §6 "Optional bearer authorization"). Returns
/// `true` (no authorization required) if `config` has no token
/// configured at all.
#[must_use]
pub fn authorized(config: &Config, presented: Option<&str>) -> bool {
    match (&config.auth_token, &config.auth_token_prev) {
        (None, _) => true,
        (Some(current), prev) => {
            presented.is_some_and(|token| token == current || prev.as_deref() == Some(token))
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use myco_core::{NodeConfig, NodeIdentity, NodeLimits, PeerTable, Wal};
    use myco_crypto::{EpochKeys, Metrics};
    use rand::{rngs::StdRng, SeedableRng};
    use zerocopy::IntoBytes;

    use super::*;

    fn make_node() -> Node<StdRng> {
        let config = NodeConfig {
            identity: NodeIdentity { public_key: [1u8; 32], node_id: 1, zone_id: 0 },
            gossip_psk: None,
            gossip_fanout: 4,
            limits: NodeLimits::default(),
        };
        Node::new(
            config,
            Arc::new(PeerTable::new(vec![])),
            Wal::new(4096, 1024),
            EpochKeys::new(1, None),
            Arc::new(Metrics::default()),
            StdRng::seed_from_u64(1),
        )
    }

    #[test]
    fn handle_deploy_accepts_well_formed_body() {
        let mut node = make_node();
        let svc = Service::new(42, "nginx", "flake:nginx", "nginx");
        let mut actions = Vec::new();
        let outcome = handle_deploy(&mut node, 1000, svc.as_bytes(), &mut actions).unwrap();
        assert_eq!(outcome, DeployOutcome::Deployed { id: 42 });
    }

    #[test]
    fn handle_deploy_rejects_wrong_size_body() {
        let mut node = make_node();
        let mut actions = Vec::new();
        let outcome = handle_deploy(&mut node, 1000, b"too short", &mut actions).unwrap();
        assert!(matches!(outcome, DeployOutcome::BadSize { .. }));
    }

    #[test]
    fn repeated_admin_deploys_each_mint_a_newer_local_version() {
        // Every admin injection advances the node's own HLC, so a
        // replayed admin deploy is never "already up to date" - only a
        // remote Deploy packet carrying a non-newer version can be.
        let mut node = make_node();
        let svc = Service::new(7, "a", "flake:a", "a");
        let mut actions = Vec::new();
        let first = handle_deploy(&mut node, 1000, svc.as_bytes(), &mut actions).unwrap();
        let second = handle_deploy(&mut node, 1000, svc.as_bytes(), &mut actions).unwrap();
        assert_eq!(first, DeployOutcome::Deployed { id: 7 });
        assert_eq!(second, DeployOutcome::Deployed { id: 7 });
    }

    #[test]
    fn metrics_text_reports_counters() {
        let mut node = make_node();
        let svc = Service::new(1, "a", "flake:a", "a");
        let mut actions = Vec::new();
        handle_deploy(&mut node, 1000, svc.as_bytes(), &mut actions).unwrap();
        let text = metrics_text(1, &node);
        assert!(text.contains("knowledge_height 1"));
        assert!(text.contains("services_known 1"));
        assert!(text.contains("last_deployed 1"));
    }

    #[test]
    fn knowledge_height_outpaces_services_known_once_an_id_repeats() {
        let mut node = make_node();
        let svc = Service::new(1, "a", "flake:a", "a");
        let mut actions = Vec::new();
        handle_deploy(&mut node, 1000, svc.as_bytes(), &mut actions).unwrap();
        handle_deploy(&mut node, 1001, svc.as_bytes(), &mut actions).unwrap();
        let text = metrics_text(1, &node);
        assert!(text.contains("knowledge_height 2"));
        assert!(text.contains("services_known 1"));
    }

    #[test]
    fn authorized_without_configured_token_allows_anything() {
        let config = Config::default();
        assert!(authorized(&config, None));
    }

    #[test]
    fn authorized_checks_current_and_previous_tokens() {
        let config = Config {
            auth_token: Some("current".to_string()),
            auth_token_prev: Some("previous".to_string()),
            ..Config::default()
        };
        assert!(authorized(&config, Some("current")));
        assert!(authorized(&config, Some("previous")));
        assert!(!authorized(&config, Some("wrong")));
        assert!(!authorized(&config, None));
    }
}
