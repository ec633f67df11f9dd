//! Suite Configuration Builder
//!
//! Provides a fluent builder for constructing suite configurations in code

use super::suite::{Phase, PhaseSpec, ServerSpec, SuiteConfig};
use std::path::PathBuf;
use std::time::Duration;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default)]
pub struct SuiteConfigBuilder {
    config: SuiteConfig,
}

impl SuiteConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SuiteConfig::default(),
        }
    }

    /// Set the command for any phase slot
    pub fn phase(mut self, phase: Phase, spec: PhaseSpec) -> Self {
        self.config.phases.set(phase, spec);
        self
    }

    pub fn setup(self, spec: PhaseSpec) -> Self {
        self.phase(Phase::Setup, spec)
    }

    pub fn consumer(self, spec: PhaseSpec) -> Self {
        self.phase(Phase::Consumer, spec)
    }

    pub fn provider(self, spec: PhaseSpec) -> Self {
        self.phase(Phase::Provider, spec)
    }

    pub fn advanced(self, spec: PhaseSpec) -> Self {
        self.phase(Phase::Advanced, spec)
    }

    /// Add a dependent server
    pub fn server(mut self, spec: ServerSpec) -> Self {
        self.config.servers.push(spec);
        self
    }

    /// Set the shared readiness deadline for all servers
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.config.readiness_timeout_ms = millis(timeout);
        self
    }

    /// Set the SIGTERM grace period before SIGKILL
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace_ms = millis(grace);
        self
    }

    pub fn health_poll_interval(mut self, interval: Duration) -> Self {
        self.config.health_poll_interval_ms = millis(interval);
        self
    }

    pub fn advanced_affects_overall(mut self, affects: bool) -> Self {
        self.config.advanced_affects_overall = affects;
        self
    }

    pub fn artifacts_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.artifacts_dir = Some(dir.into());
        self
    }

    pub fn free_ports_before_start(mut self, free: bool) -> Self {
        self.config.free_ports_before_start = free;
        self
    }

    pub fn build(self) -> SuiteConfig {
        self.config
    }
}
