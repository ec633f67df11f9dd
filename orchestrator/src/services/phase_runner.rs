//! Real phase runner implementation
//!
//! Runs one external command to completion and turns whatever happened into
//! a `PhaseResult`. Spawn errors and non-zero exits are data, not errors.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

use crate::config::PhaseSpec;
use crate::traits::PhaseRunner;
use shared::{Component, PhaseResult, component_debug, component_info, component_warn};

/// Where a phase command's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutput {
    /// Share our stdout and stderr
    Inherit,
    /// Send stdout to our stderr, keeping our stdout for machine output
    Stderr,
    /// Discard both streams
    Silent,
}

/// Real phase runner using OS processes
pub struct RealPhaseRunner {
    output: PhaseOutput,
}

impl RealPhaseRunner {
    /// Create a runner that streams phase output to the terminal
    pub fn new() -> Self {
        Self { output: PhaseOutput::Inherit }
    }

    /// Configure where phase output goes (fluent API)
    pub fn with_output(mut self, output: PhaseOutput) -> Self {
        self.output = output;
        self
    }

    /// Inherit output, or discard it entirely (fluent API)
    pub fn with_inherited_output(self, inherit: bool) -> Self {
        self.with_output(if inherit { PhaseOutput::Inherit } else { PhaseOutput::Silent })
    }

    pub fn output(&self) -> PhaseOutput {
        self.output
    }

    fn build_command(&self, phase: &PhaseSpec) -> Command {
        let mut cmd = Command::new(&phase.command);
        cmd.args(&phase.args).envs(&phase.env).stdin(Stdio::null()).kill_on_drop(true);

        if let Some(ref dir) = phase.working_dir {
            cmd.current_dir(dir);
        }

        match self.output {
            PhaseOutput::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            PhaseOutput::Stderr => {
                cmd.stdout(std::io::stderr()).stderr(Stdio::inherit());
            }
            PhaseOutput::Silent => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        cmd
    }
}

impl Default for RealPhaseRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhaseRunner for RealPhaseRunner {
    async fn run(&self, phase: &PhaseSpec) -> PhaseResult {
        component_info!(Component::PhaseRunner, "🔧 Running {}: {}", phase.name, phase.display_command());

        let started = Instant::now();
        let mut cmd = self.build_command(phase);

        // Dropping this future (interrupt) kills the child via kill_on_drop
        let status = match cmd.status().await {
            Ok(status) => status,
            Err(e) => {
                component_warn!(Component::PhaseRunner, "❌ {} could not start: {}", phase.name, e);
                return PhaseResult::spawn_failed(&phase.name, e, started.elapsed());
            }
        };

        let result = PhaseResult::from_exit(&phase.name, status.code(), started.elapsed());

        if result.success {
            component_info!(Component::PhaseRunner, "✅ {} passed in {}ms", phase.name, result.duration_ms);
        } else {
            component_warn!(
                Component::PhaseRunner,
                "❌ {} failed in {}ms: {}",
                phase.name,
                result.duration_ms,
                result.error_message.as_deref().unwrap_or("unknown")
            );
        }
        component_debug!(Component::PhaseRunner, "{} exit status: {:?}", phase.name, status);

        result
    }
}
