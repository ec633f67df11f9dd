//! Real server supervisor implementation
//!
//! Keeps a registry of every server process it starts. Each process gets a
//! background watcher that decides readiness (health URL or log pattern)
//! and publishes state changes on a watch channel. Shutdown is total: every
//! registered process ends up `Stopped` whether it left politely or not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::{ReadinessProbe, ServerSpec};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::output_handler::forward_output;
use crate::traits::ServerSupervisor;
use shared::logging::{log_shutdown, log_success};
use shared::{Component, ProcessState, ServerSnapshot, component_debug, component_error, component_info, component_warn};

/// How often a log-pattern watcher checks for exit once output has closed
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Health poll ticker. A slow request pushes the next poll back instead of
/// firing the missed ticks back to back.
fn health_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Move `state` forward if the transition is legal. Returns whether it moved.
fn advance(state: &watch::Sender<ProcessState>, next: ProcessState) -> bool {
    state.send_if_modified(|current| {
        if current.can_advance_to(next) {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// A server process owned by the supervisor
struct ManagedProcess {
    spec: ServerSpec,
    seq: u64,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    child: Arc<Mutex<Child>>,
    state: Arc<watch::Sender<ProcessState>>,
    watcher: Option<JoinHandle<()>>,
}

impl ManagedProcess {
    fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            name: self.spec.name.clone(),
            command: self.spec.command.clone(),
            args: self.spec.args.clone(),
            env: self.spec.effective_env(),
            port: self.spec.port,
            pid: self.pid,
            state: *self.state.borrow(),
            started_at: self.started_at,
        }
    }
}

#[derive(Default)]
struct Registry {
    processes: HashMap<String, ManagedProcess>,
    next_seq: u64,
}

/// Real supervisor using OS processes
pub struct RealServerSupervisor {
    registry: Mutex<Registry>,
    grace_period: Duration,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl RealServerSupervisor {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            registry: Mutex::new(Registry::default()),
            grace_period: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            client,
        }
    }

    /// Configure how long SIGTERM is given before SIGKILL (fluent API)
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Configure how often health URLs are polled (fluent API)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Current state of one server, if registered
    pub async fn state_of(&self, name: &str) -> Option<ProcessState> {
        let registry = self.registry.lock().await;
        registry.processes.get(name).map(|p| *p.state.borrow())
    }

    /// Number of registered servers
    pub async fn len(&self) -> usize {
        self.registry.lock().await.processes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn build_command(spec: &ServerSpec) -> Command {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(spec.effective_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for RealServerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerSupervisor for RealServerSupervisor {
    async fn spawn(&self, spec: ServerSpec) -> OrchestratorResult<ServerSnapshot> {
        if spec.timeout_ms == 0 {
            return Err(OrchestratorError::InvalidTimeout { name: spec.name });
        }

        // Held across spawn so two concurrent spawns of one name can't both win
        let mut registry = self.registry.lock().await;
        if registry.processes.contains_key(&spec.name) {
            return Err(OrchestratorError::DuplicateServer { name: spec.name });
        }

        component_info!(Component::Supervisor, "🚀 Starting server {}: {}", spec.name, spec.command);

        let mut child = Self::build_command(&spec)
            .spawn()
            .map_err(|e| OrchestratorError::process_start(&spec.name, e))?;

        let pid = child.id();
        let capture = matches!(spec.readiness, ReadinessProbe::LogPattern(_));
        let lines = forward_output(&spec.name, child.stdout.take(), child.stderr.take(), capture);

        let (state, _) = watch::channel(ProcessState::Starting);
        let state = Arc::new(state);
        let child = Arc::new(Mutex::new(child));

        let watch = ReadinessWatch {
            name: spec.name.clone(),
            probe: spec.readiness.clone(),
            timeout: spec.readiness_timeout(),
            poll_interval: self.poll_interval,
            client: self.client.clone(),
            child: Arc::clone(&child),
            state: Arc::clone(&state),
        };
        let watcher = tokio::spawn(watch.run(lines));

        let seq = registry.next_seq;
        registry.next_seq += 1;

        let managed = ManagedProcess {
            spec,
            seq,
            pid,
            started_at: Utc::now(),
            child,
            state,
            watcher: Some(watcher),
        };
        let snapshot = managed.snapshot();

        component_debug!(Component::Supervisor, "{} registered with pid {:?}", snapshot.name, pid);
        registry.processes.insert(snapshot.name.clone(), managed);

        Ok(snapshot)
    }

    async fn await_ready(&self, deadline: Duration) -> Vec<ServerSnapshot> {
        let pending: Vec<(String, Arc<watch::Sender<ProcessState>>)> = {
            let registry = self.registry.lock().await;
            registry
                .processes
                .values()
                .map(|p| (p.spec.name.clone(), Arc::clone(&p.state)))
                .collect()
        };

        component_info!(
            Component::Supervisor,
            "⏳ Waiting up to {:?} for {} server(s) to become ready",
            deadline,
            pending.len()
        );

        let mut waits = JoinSet::new();
        for (name, state) in pending {
            waits.spawn(async move {
                let mut rx = state.subscribe();
                let settled = matches!(
                    tokio::time::timeout(deadline, rx.wait_for(|s| s.is_settled())).await,
                    Ok(Ok(_))
                );

                if !settled && advance(&state, ProcessState::Degraded) {
                    component_warn!(
                        Component::Supervisor,
                        "⚠️ {} not ready by the shared deadline; continuing without it",
                        name
                    );
                }
            });
        }

        while let Some(joined) = waits.join_next().await {
            if let Err(e) = joined {
                component_error!(Component::Supervisor, "Readiness wait task failed: {}", e);
            }
        }

        self.snapshot().await
    }

    async fn snapshot(&self) -> Vec<ServerSnapshot> {
        let registry = self.registry.lock().await;
        let mut processes: Vec<&ManagedProcess> = registry.processes.values().collect();
        processes.sort_by_key(|p| p.seq);
        processes.into_iter().map(ManagedProcess::snapshot).collect()
    }

    async fn shutdown_all(&self) {
        // Claim everything under the lock so concurrent calls never double-stop
        let targets: Vec<StopTarget> = {
            let mut registry = self.registry.lock().await;
            registry
                .processes
                .values_mut()
                .filter_map(|p| {
                    let current = *p.state.borrow();
                    let reap_only = match current {
                        ProcessState::Stopping | ProcessState::Stopped => return None,
                        ProcessState::Failed => true,
                        _ => {
                            advance(&p.state, ProcessState::Stopping);
                            false
                        }
                    };

                    Some(StopTarget {
                        name: p.spec.name.clone(),
                        pid: p.pid,
                        child: Arc::clone(&p.child),
                        state: Arc::clone(&p.state),
                        watcher: p.watcher.take(),
                        reap_only,
                    })
                })
                .collect()
        };

        if targets.is_empty() {
            component_debug!(Component::Supervisor, "No running servers to stop");
            return;
        }

        log_shutdown(&Component::Supervisor, &format!("Stopping {} server(s)", targets.len()));

        let mut stops = JoinSet::new();
        for target in targets {
            stops.spawn(target.stop(self.grace_period));
        }

        while let Some(joined) = stops.join_next().await {
            if let Err(e) = joined {
                component_error!(Component::Supervisor, "Shutdown task failed: {}", e);
            }
        }

        log_success(&Component::Supervisor, "All servers stopped");
    }
}

enum ProbeOutcome {
    Ready,
    Exited(Option<i32>),
}

/// Background readiness detection for one process
struct ReadinessWatch {
    name: String,
    probe: ReadinessProbe,
    timeout: Duration,
    poll_interval: Duration,
    client: reqwest::Client,
    child: Arc<Mutex<Child>>,
    state: Arc<watch::Sender<ProcessState>>,
}

impl ReadinessWatch {
    async fn run(self, lines: Option<mpsc::UnboundedReceiver<String>>) {
        let outcome = tokio::time::timeout(self.timeout, self.probe_until_decided(lines)).await;

        match outcome {
            Ok(ProbeOutcome::Ready) => {
                if advance(&self.state, ProcessState::Ready) {
                    component_info!(Component::Supervisor, "✅ {} is ready ({})", self.name, self.probe);
                }
            }
            Ok(ProbeOutcome::Exited(code)) => {
                if advance(&self.state, ProcessState::Failed) {
                    component_error!(
                        Component::Supervisor,
                        "❌ {} exited before becoming ready (code {:?})",
                        self.name,
                        code
                    );
                }
            }
            Err(_) => {
                // Fail-open: a slow server may still answer the phases
                if advance(&self.state, ProcessState::Degraded) {
                    component_warn!(
                        Component::Supervisor,
                        "⚠️ {} not ready after {:?}; assuming it is usable",
                        self.name,
                        self.timeout
                    );
                }
            }
        }
    }

    async fn probe_until_decided(&self, lines: Option<mpsc::UnboundedReceiver<String>>) -> ProbeOutcome {
        match &self.probe {
            ReadinessProbe::HealthUrl(url) => self.poll_health(url).await,
            ReadinessProbe::LogPattern(pattern) => self.watch_output(pattern, lines).await,
        }
    }

    async fn poll_health(&self, url: &str) -> ProbeOutcome {
        let mut ticker = health_ticker(self.poll_interval);

        loop {
            ticker.tick().await;

            if let Some(code) = self.exit_status().await {
                return ProbeOutcome::Exited(code);
            }

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return ProbeOutcome::Ready,
                Ok(response) => {
                    component_debug!(Component::Supervisor, "{} health check returned {}", self.name, response.status());
                }
                Err(e) => {
                    component_debug!(Component::Supervisor, "{} health check failed: {}", self.name, e);
                }
            }
        }
    }

    async fn watch_output(&self, pattern: &str, lines: Option<mpsc::UnboundedReceiver<String>>) -> ProbeOutcome {
        if let Some(mut lines) = lines {
            while let Some(line) = lines.recv().await {
                if line.contains(pattern) {
                    return ProbeOutcome::Ready;
                }
            }
        }

        // Output closed without a match; wait for the exit to be observable
        loop {
            if let Some(code) = self.exit_status().await {
                return ProbeOutcome::Exited(code);
            }
            tokio::time::sleep(EXIT_POLL).await;
        }
    }

    /// `Some(code)` once the process has exited
    async fn exit_status(&self) -> Option<Option<i32>> {
        let mut child = self.child.lock().await;
        match child.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            Ok(None) => None,
            Err(e) => {
                component_debug!(Component::Supervisor, "{} try_wait failed: {}", self.name, e);
                None
            }
        }
    }
}

/// One process claimed by `shutdown_all`
struct StopTarget {
    name: String,
    pid: Option<u32>,
    child: Arc<Mutex<Child>>,
    state: Arc<watch::Sender<ProcessState>>,
    watcher: Option<JoinHandle<()>>,
    reap_only: bool,
}

impl StopTarget {
    async fn stop(mut self, grace: Duration) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }

        let mut child = self.child.lock().await;

        if self.reap_only {
            let _ = child.wait().await;
            advance(&self.state, ProcessState::Stopped);
            component_debug!(Component::Supervisor, "Reaped failed server {}", self.name);
            return;
        }

        if let Ok(Some(status)) = child.try_wait() {
            component_info!(Component::Supervisor, "{} had already exited ({})", self.name, status);
            advance(&self.state, ProcessState::Stopped);
            return;
        }

        self.terminate(&mut child);

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                component_info!(Component::Supervisor, "🛑 {} stopped gracefully ({})", self.name, status);
            }
            Ok(Err(e)) => {
                component_warn!(Component::Supervisor, "Error waiting for {}: {}", self.name, e);
            }
            Err(_) => {
                component_warn!(
                    Component::Supervisor,
                    "🔨 {} did not exit within {:?}, force killing",
                    self.name,
                    grace
                );
                if let Err(e) = child.kill().await {
                    component_error!(Component::Supervisor, "Failed to kill {}: {}", self.name, e);
                }
            }
        }

        advance(&self.state, ProcessState::Stopped);
    }

    #[cfg(unix)]
    fn terminate(&self, child: &mut Child) {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return;
        };

        component_debug!(Component::Supervisor, "Sending SIGTERM to {} (pid {})", self.name, pid);
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // ESRCH: gone between try_wait and here
            component_debug!(Component::Supervisor, "SIGTERM to {} failed: {}", self.name, e);
            let _ = child.start_kill();
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.start_kill() {
            component_debug!(Component::Supervisor, "Terminate {} failed: {}", self.name, e);
        }
    }
}
