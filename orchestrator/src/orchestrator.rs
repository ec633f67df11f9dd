//! Main test-suite pipeline
//!
//! Drives the phases in order, gates server startup on the consumer phase,
//! and guarantees that every server it started is released exactly once,
//! whatever happens in between.

use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::sync::mpsc;

use shared::logging::{log_error, log_progress, log_startup};
use shared::{
    Component, PhaseResult, ProcessState, SuiteResult, SuiteResultBuilder, WarningKind, component_debug,
    component_error, component_info, component_warn,
};

use crate::config::{Phase, PhaseSpec, SuiteConfig};
use crate::error::OrchestratorError;
use crate::traits::{ArtifactSource, PhaseRunner, ServerSupervisor};

/// Where the pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Setup,
    Consumer,
    Abort,
    ServersStarting,
    Provider,
    Advanced,
    Teardown,
    Done,
}

impl Stage {
    fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Setup => Stage::Setup,
            Phase::Consumer => Stage::Consumer,
            Phase::Provider => Stage::Provider,
            Phase::Advanced => Stage::Advanced,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Init => "INIT",
            Stage::Setup => "SETUP",
            Stage::Consumer => "CONSUMER",
            Stage::Abort => "ABORT",
            Stage::ServersStarting => "SERVERS_STARTING",
            Stage::Provider => "PROVIDER",
            Stage::Advanced => "ADVANCED",
            Stage::Teardown => "TEARDOWN",
            Stage::Done => "DONE",
        };
        write!(f, "{label}")
    }
}

/// Why the pipeline stopped early
enum Halt {
    Interrupted,
    Internal(OrchestratorError),
}

/// Race `future` against the shutdown channel. `None` means interrupted;
/// the future is dropped, which kills any child it owns.
async fn interruptible<F: Future>(shutdown_rx: &mut mpsc::Receiver<()>, future: F) -> Option<F::Output> {
    tokio::select! {
        output = future => Some(output),
        _ = shutdown_rx.recv() => None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs one contract test suite against injected services
pub struct TestOrchestrator<S, R>
where
    S: ServerSupervisor + 'static,
    R: PhaseRunner + 'static,
{
    config: SuiteConfig,

    /// Injected services
    supervisor: S,
    runner: R,
    artifacts: Option<Box<dyn ArtifactSource>>,

    stage: Stage,
    torn_down: bool,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<S, R> TestOrchestrator<S, R>
where
    S: ServerSupervisor + 'static,
    R: PhaseRunner + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(config: SuiteConfig, supervisor: S, runner: R) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Self {
            config,
            supervisor,
            runner,
            artifacts: None,
            stage: Stage::Init,
            torn_down: false,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Attach a contract listing to include in the result (fluent API)
    pub fn with_artifacts<A: ArtifactSource + 'static>(mut self, source: A) -> Self {
        self.artifacts = Some(Box::new(source));
        self
    }

    /// Get shutdown sender for external shutdown requests
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Run the whole suite
    ///
    /// Never fails: every problem ends up in the returned `SuiteResult`.
    /// Servers are shut down before this returns on every path.
    pub async fn run(&mut self) -> SuiteResult {
        let mut results = SuiteResultBuilder::new(self.config.required_phases());
        log_startup(&Component::Orchestrator, &format!("suite run {}", results.run_id()));

        let pipeline = AssertUnwindSafe(self.run_pipeline(&mut results)).catch_unwind().await;

        match pipeline {
            Ok(Ok(())) => {}
            Ok(Err(Halt::Interrupted)) => {
                component_warn!(Component::Orchestrator, "🛑 Interrupted during {}", self.stage);
                results.mark_interrupted();
            }
            Ok(Err(Halt::Internal(e))) => {
                log_error(&Component::Orchestrator, &format!("Stage {}", self.stage), &e);
                results.set_error(e.to_string());
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                component_error!(Component::Orchestrator, "💥 Pipeline panicked during {}: {}", self.stage, message);
                results.set_error(format!("panic during {}: {message}", self.stage));
            }
        }

        self.teardown().await;
        self.collect_artifacts(&mut results).await;
        results.set_servers(self.supervisor.snapshot().await);

        let result = results.finish();
        self.transition(Stage::Done);
        self.log_summary(&result);

        result
    }

    async fn run_pipeline(&mut self, results: &mut SuiteResultBuilder) -> Result<(), Halt> {
        // Fail-fast gate: nothing downstream runs without passing contracts
        for phase in [Phase::Setup, Phase::Consumer] {
            let Some(spec) = self.config.phases.get(phase) else {
                continue;
            };

            self.transition(Stage::for_phase(phase));
            if !self.run_phase(&spec, results).await? {
                self.transition(Stage::Abort);
                component_warn!(
                    Component::Orchestrator,
                    "⛔ {} failed; skipping servers and remaining phases",
                    spec.name
                );
                return Ok(());
            }
        }

        self.start_servers(results).await?;

        for phase in [Phase::Provider, Phase::Advanced] {
            let Some(spec) = self.config.phases.get(phase) else {
                continue;
            };

            self.transition(Stage::for_phase(phase));
            self.run_phase(&spec, results).await?;
        }

        Ok(())
    }

    /// Run and record one phase. Returns whether it passed.
    async fn run_phase(&mut self, spec: &PhaseSpec, results: &mut SuiteResultBuilder) -> Result<bool, Halt> {
        let started = Instant::now();
        let runner = &self.runner;
        let run = AssertUnwindSafe(async move { runner.run(spec).await }).catch_unwind();

        let result = match interruptible(&mut self.shutdown_rx, run).await {
            None => {
                results.record_phase(PhaseResult::interrupted(&spec.name, started.elapsed()));
                return Err(Halt::Interrupted);
            }
            Some(Ok(result)) => result,
            Some(Err(panic)) => {
                let message = format!("runner panicked: {}", panic_message(&*panic));
                component_error!(Component::Orchestrator, "💥 {} {}", spec.name, message);
                PhaseResult::crashed(&spec.name, message, started.elapsed())
            }
        };

        let passed = result.success;
        results.record_phase(result);
        Ok(passed)
    }

    async fn start_servers(&mut self, results: &mut SuiteResultBuilder) -> Result<(), Halt> {
        self.transition(Stage::ServersStarting);

        if self.config.servers.is_empty() {
            component_debug!(Component::Orchestrator, "No servers configured");
            return Ok(());
        }

        #[cfg(unix)]
        if self.config.free_ports_before_start {
            crate::services::PortCleanup::new(self.config.server_ports())
                .with_grace_period(self.config.shutdown_grace())
                .free_ports()
                .await;
        }

        for spec in self.config.servers.clone() {
            let name = spec.name.clone();

            match interruptible(&mut self.shutdown_rx, self.supervisor.spawn(spec)).await {
                None => return Err(Halt::Interrupted),
                Some(Ok(snapshot)) => {
                    component_debug!(Component::Orchestrator, "Spawned {} (pid {:?})", snapshot.name, snapshot.pid);
                }
                Some(Err(e)) if e.is_spawn_failure() => {
                    component_warn!(Component::Orchestrator, "⚠️ {}; continuing without it", e);
                    results.warn(&name, WarningKind::SpawnFailed, e.to_string());
                }
                Some(Err(e)) => return Err(Halt::Internal(e)),
            }
        }

        let deadline = self.config.readiness_timeout();
        let snapshots = interruptible(&mut self.shutdown_rx, self.supervisor.await_ready(deadline))
            .await
            .ok_or(Halt::Interrupted)?;

        let mut ready = 0;
        for snapshot in &snapshots {
            match snapshot.state {
                ProcessState::Ready => ready += 1,
                ProcessState::Degraded => results.warn(
                    &snapshot.name,
                    WarningKind::Degraded,
                    format!("not confirmed ready within {}ms; continuing", self.config.readiness_timeout_ms),
                ),
                ProcessState::Failed => {
                    results.warn(&snapshot.name, WarningKind::Failed, "exited before becoming ready")
                }
                _ => {}
            }
        }

        log_progress(
            &Component::Orchestrator,
            "Servers",
            &format!("{ready}/{} ready", snapshots.len()),
        );
        Ok(())
    }

    /// Release every server. Runs once; later calls do nothing.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.transition(Stage::Teardown);

        let supervisor = &self.supervisor;
        if AssertUnwindSafe(async move { supervisor.shutdown_all().await })
            .catch_unwind()
            .await
            .is_err()
        {
            component_error!(Component::Orchestrator, "💥 Server shutdown panicked");
        }
    }

    async fn collect_artifacts(&self, results: &mut SuiteResultBuilder) {
        let Some(ref source) = self.artifacts else {
            return;
        };

        match source.list_artifacts().await {
            Ok(artifacts) => {
                for artifact in &artifacts {
                    component_info!(
                        Component::Artifacts,
                        "📄 {} ({} bytes, {} interactions)",
                        artifact.name,
                        artifact.size_bytes,
                        artifact.interaction_count
                    );
                }
                results.set_artifacts(artifacts);
            }
            Err(e) => log_error(&Component::Artifacts, "Contract listing", &e),
        }
    }

    fn transition(&mut self, next: Stage) {
        component_debug!(Component::Orchestrator, "Stage {} → {}", self.stage, next);
        self.stage = next;
    }

    fn log_summary(&self, result: &SuiteResult) {
        component_info!(Component::Orchestrator, "📊 Suite summary ({})", result.run_id);
        for line in result.summary_lines() {
            if result.is_pass() {
                component_info!(Component::Orchestrator, "{}", line);
            } else {
                component_warn!(Component::Orchestrator, "{}", line);
            }
        }
    }
}
