//! Test fixtures and data for orchestrator tests
//!
//! Consistent phase plans, server specs and canned results used across the
//! test suites.

#![allow(dead_code)]

use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;

use orchestrator::{PhaseSpec, ReadinessProbe, ServerSpec, SuiteConfig};
use shared::{ArtifactInfo, PhaseResult, ProcessState, ServerSnapshot};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const SETUP: &'static str = "setup";
    pub const CONSUMER: &'static str = "consumer";
    pub const PROVIDER: &'static str = "provider";
    pub const ADVANCED: &'static str = "advanced";

    pub const MAIN_PROVIDER: &'static str = "MainProvider";
    pub const PROVIDER_PORT: u16 = 3001;

    /// Phase spec that is never actually executed (mocked runner)
    pub fn phase(name: &str) -> PhaseSpec {
        PhaseSpec::new(name, "npm").arg("run").arg(format!("test:{name}"))
    }

    /// Phase spec that runs a shell script for real
    pub fn sh_phase(name: &str, script: &str) -> PhaseSpec {
        PhaseSpec::new(name, "sh").args(["-c", script])
    }

    pub fn main_provider() -> ServerSpec {
        ServerSpec::new(
            Self::MAIN_PROVIDER,
            "node",
            ReadinessProbe::HealthUrl(format!("http://localhost:{}/health", Self::PROVIDER_PORT)),
        )
        .args(["examples/provider/server.js"])
        .port(Self::PROVIDER_PORT)
    }

    /// All four phases plus one provider server
    pub fn full_config() -> SuiteConfig {
        SuiteConfig::builder()
            .setup(Self::phase(Self::SETUP))
            .consumer(Self::phase(Self::CONSUMER))
            .provider(Self::phase(Self::PROVIDER))
            .advanced(Self::phase(Self::ADVANCED))
            .server(Self::main_provider())
            .readiness_timeout(Duration::from_secs(5))
            .build()
    }

    pub fn pass(name: &str) -> PhaseResult {
        PhaseResult::from_exit(name, Some(0), Duration::from_millis(12))
    }

    pub fn fail(name: &str) -> PhaseResult {
        PhaseResult::from_exit(name, Some(1), Duration::from_millis(12))
    }

    pub fn snapshot(spec: &ServerSpec, state: ProcessState) -> ServerSnapshot {
        ServerSnapshot {
            name: spec.name.clone(),
            command: spec.command.clone(),
            args: spec.args.clone(),
            env: spec.effective_env(),
            port: spec.port,
            pid: Some(4242),
            state,
            started_at: Utc::now(),
        }
    }

    pub fn named_snapshot(name: &str, state: ProcessState) -> ServerSnapshot {
        ServerSnapshot {
            name: name.to_string(),
            command: "node".to_string(),
            args: vec![],
            env: BTreeMap::new(),
            port: None,
            pid: Some(4242),
            state,
            started_at: Utc::now(),
        }
    }

    pub fn contract(name: &str, interactions: usize) -> ArtifactInfo {
        ArtifactInfo {
            name: name.to_string(),
            size_bytes: 512,
            interaction_count: interactions,
            generated_at: Utc::now(),
        }
    }
}
