//! Trait definitions with mockall annotations for testing
//!
//! The pipeline only talks to processes through these seams, so ordering and
//! fail-fast/fail-open policy can be exercised without spawning anything.

use std::time::Duration;

use shared::{ArtifactInfo, PhaseResult, ServerSnapshot};

use crate::config::{PhaseSpec, ServerSpec};
use crate::error::OrchestratorResult;

/// Server process supervision
///
/// Owns the registry of managed processes. Every successful `spawn`
/// registers a process that `shutdown_all` is responsible for releasing.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ServerSupervisor: Send + Sync {
    /// Start a server process and begin watching for readiness
    ///
    /// # Returns
    /// Snapshot in the `Starting` state. Fails synchronously (and registers
    /// nothing) when the name is taken, the timeout is zero, or the OS
    /// refuses to start the command.
    async fn spawn(&self, spec: ServerSpec) -> OrchestratorResult<ServerSnapshot>;

    /// Wait for every registered server to settle, all against one deadline
    ///
    /// # Returns
    /// Snapshots of all registered servers. Anything still starting when the
    /// deadline passes is reported as `Degraded`.
    async fn await_ready(&self, deadline: Duration) -> Vec<ServerSnapshot>;

    /// Current view of all registered servers
    async fn snapshot(&self) -> Vec<ServerSnapshot>;

    /// Terminate every registered server (SIGTERM, grace period, SIGKILL)
    ///
    /// Idempotent and infallible; problems are logged.
    async fn shutdown_all(&self);
}

/// Phase command execution
#[mockall::automock]
#[async_trait::async_trait]
pub trait PhaseRunner: Send + Sync {
    /// Run a command to completion
    ///
    /// # Returns
    /// Outcome as data; a failed or unstartable command is `success = false`.
    async fn run(&self, phase: &PhaseSpec) -> PhaseResult;
}

/// Generated contract file listing for the report collector
#[mockall::automock]
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn list_artifacts(&self) -> OrchestratorResult<Vec<ArtifactInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that mock traits can be instantiated
    #[tokio::test]
    async fn test_mock_trait_instantiation() {
        let _mock_supervisor = MockServerSupervisor::new();
        let _mock_runner = MockPhaseRunner::new();
        let _mock_artifacts = MockArtifactSource::new();
    }
}
