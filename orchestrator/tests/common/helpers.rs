//! Test helpers and fakes for orchestrator tests
//!
//! mockall mocks cover ordering and call counts. The hand-written fakes here
//! cover what mocks can't express well: phases that hang until interrupted,
//! panics, and counters that stay observable after the orchestrator is done.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orchestrator::traits::{MockPhaseRunner, MockServerSupervisor};
use orchestrator::{OrchestratorResult, PhaseRunner, PhaseSpec, ServerSpec, ServerSupervisor};
use shared::{PhaseResult, ProcessState, ServerSnapshot};

use super::fixtures::TestFixtures;

/// Shared helper functions
pub struct TestHelpers;

impl TestHelpers {
    /// Runner mock expecting each named phase exactly once with the given outcome
    pub fn runner_with(outcomes: &[(&str, bool)]) -> MockPhaseRunner {
        let mut runner = MockPhaseRunner::new();

        for &(name, success) in outcomes {
            let expected = name.to_string();
            runner
                .expect_run()
                .withf(move |phase| phase.name == expected)
                .times(1)
                .returning(move |phase| {
                    if success {
                        TestFixtures::pass(&phase.name)
                    } else {
                        TestFixtures::fail(&phase.name)
                    }
                });
        }

        runner
    }

    /// Supervisor mock that accepts every spawn and reports `ready_state` for all
    pub fn supervisor_reporting(ready_state: ProcessState) -> MockServerSupervisor {
        let spawned: Arc<Mutex<Vec<ServerSpec>>> = Arc::default();
        let mut supervisor = MockServerSupervisor::new();

        let registry = Arc::clone(&spawned);
        supervisor.expect_spawn().returning(move |spec| {
            let snapshot = TestFixtures::snapshot(&spec, ProcessState::Starting);
            registry.lock().unwrap().push(spec);
            Ok(snapshot)
        });

        let registry = Arc::clone(&spawned);
        supervisor.expect_await_ready().times(1).returning(move |_| {
            registry
                .lock()
                .unwrap()
                .iter()
                .map(|spec| TestFixtures::snapshot(spec, ready_state))
                .collect()
        });

        supervisor.expect_shutdown_all().times(1).returning(|| ());

        let registry = Arc::clone(&spawned);
        supervisor.expect_snapshot().returning(move || {
            registry
                .lock()
                .unwrap()
                .iter()
                .map(|spec| TestFixtures::snapshot(spec, ProcessState::Stopped))
                .collect()
        });

        supervisor
    }

    /// Supervisor mock for runs that must never reach server startup
    pub fn supervisor_never_spawning() -> MockServerSupervisor {
        let mut supervisor = MockServerSupervisor::new();
        supervisor.expect_spawn().never();
        supervisor.expect_await_ready().never();
        supervisor.expect_shutdown_all().times(1).returning(|| ());
        supervisor.expect_snapshot().returning(Vec::new);
        supervisor
    }
}

/// What a scripted phase does when run
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Pass,
    Fail,
    /// Sleeps far longer than any test; only an interrupt ends it
    Hang,
    Panic,
}

/// Phase runner driven by a name → step table
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    steps: HashMap<String, Step>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, step: Step) -> Self {
        self.steps.insert(name.to_string(), step);
        self
    }

    /// Phase names in the order they were started
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PhaseRunner for ScriptedRunner {
    async fn run(&self, phase: &PhaseSpec) -> PhaseResult {
        self.calls.lock().unwrap().push(phase.name.clone());

        match self.steps.get(&phase.name).copied().unwrap_or(Step::Pass) {
            Step::Pass => TestFixtures::pass(&phase.name),
            Step::Fail => TestFixtures::fail(&phase.name),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                TestFixtures::pass(&phase.name)
            }
            Step::Panic => panic!("scripted panic in {}", phase.name),
        }
    }
}

/// Supervisor fake that counts calls and never touches the OS
#[derive(Clone)]
pub struct RecordingSupervisor {
    servers: Arc<Mutex<Vec<ServerSnapshot>>>,
    spawn_calls: Arc<AtomicUsize>,
    shutdown_calls: Arc<AtomicUsize>,
    ready_state: ProcessState,
    panic_on_ready: bool,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self {
            servers: Arc::default(),
            spawn_calls: Arc::default(),
            shutdown_calls: Arc::default(),
            ready_state: ProcessState::Ready,
            panic_on_ready: false,
        }
    }

    pub fn with_ready_state(mut self, state: ProcessState) -> Self {
        self.ready_state = state;
        self
    }

    pub fn panicking_on_ready(mut self) -> Self {
        self.panic_on_ready = true;
        self
    }

    pub fn spawn_calls(&self) -> usize {
        self.spawn_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerSupervisor for RecordingSupervisor {
    async fn spawn(&self, spec: ServerSpec) -> OrchestratorResult<ServerSnapshot> {
        self.spawn_calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = TestFixtures::snapshot(&spec, ProcessState::Starting);
        self.servers.lock().unwrap().push(snapshot.clone());
        Ok(snapshot)
    }

    async fn await_ready(&self, _deadline: Duration) -> Vec<ServerSnapshot> {
        if self.panic_on_ready {
            panic!("readiness bookkeeping exploded");
        }

        let mut servers = self.servers.lock().unwrap();
        for server in servers.iter_mut() {
            server.state = self.ready_state;
        }
        servers.clone()
    }

    async fn snapshot(&self) -> Vec<ServerSnapshot> {
        self.servers.lock().unwrap().clone()
    }

    async fn shutdown_all(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        for server in self.servers.lock().unwrap().iter_mut() {
            server.state = ProcessState::Stopped;
        }
    }
}
