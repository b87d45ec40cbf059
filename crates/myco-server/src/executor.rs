//! The Deploy executor capability (spec §9 "Polymorphic executor"): the
//! Node only signals that a Deploy was newly accepted via
//! [`myco_core::NodeAction::Deployed`]; something downstream of the run
//! loop decides what that means. The Nix build/systemd-unit-write that a
//! real deployment would trigger is out of scope here (spec §1) — only
//! this capability's shape is.

use myco_proto::Service;
use thiserror::Error;

/// Failures from executing an accepted Deploy.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The downstream build/activation step failed.
    #[error("executor failed for service {id}: {reason}")]
    Failed {
        /// The service id that failed to execute.
        id: u64,
        /// Why it failed.
        reason: String,
    },
}

/// A capability invoked once per newly-accepted Deploy.
pub trait Executor: Send + Sync {
    /// Act on a newly-accepted `service` (e.g. trigger a Nix build and
    /// write a systemd unit — out of scope here, see module docs).
    ///
    /// # Errors
    ///
    /// [`ExecutorError`] if the downstream action failed. The run loop
    /// logs this and continues; a failed executor invocation does not
    /// roll back the CRDT acceptance.
    fn deploy(&self, service: &Service) -> Result<(), ExecutorError>;
}

/// An executor that does nothing, for the simulator and for admin-only
/// deployments where no downstream system needs to be told.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

impl Executor for NoopExecutor {
    fn deploy(&self, _service: &Service) -> Result<(), ExecutorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_executor_always_succeeds() {
        let svc = Service::new(1, "nginx", "flake:nginx", "nginx");
        assert!(NoopExecutor.deploy(&svc).is_ok());
    }
}
