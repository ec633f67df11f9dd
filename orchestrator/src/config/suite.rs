//! Suite Configuration
//!
//! Describes every phase command and every dependent server as data. Nothing
//! about the pipeline is hardcoded beyond the order of the phase slots.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OrchestratorError, OrchestratorResult};

/// The four command slots of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Setup,
    Consumer,
    Provider,
    Advanced,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Setup, Phase::Consumer, Phase::Provider, Phase::Advanced];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Consumer => "consumer",
            Phase::Provider => "provider",
            Phase::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One external command run as a pipeline phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Defaults to the slot name when left empty
    #[serde(default)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl PhaseSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Command line as it would be typed, for logs
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Configured commands for each slot; unconfigured slots are skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePlan {
    #[serde(default)]
    pub setup: Option<PhaseSpec>,
    #[serde(default)]
    pub consumer: Option<PhaseSpec>,
    #[serde(default)]
    pub provider: Option<PhaseSpec>,
    #[serde(default)]
    pub advanced: Option<PhaseSpec>,
}

impl PhasePlan {
    /// Spec for a slot with its name resolved
    pub fn get(&self, phase: Phase) -> Option<PhaseSpec> {
        let slot = match phase {
            Phase::Setup => &self.setup,
            Phase::Consumer => &self.consumer,
            Phase::Provider => &self.provider,
            Phase::Advanced => &self.advanced,
        };

        slot.clone().map(|mut spec| {
            if spec.name.trim().is_empty() {
                spec.name = phase.as_str().to_string();
            }
            spec
        })
    }

    pub fn set(&mut self, phase: Phase, spec: PhaseSpec) {
        let slot = match phase {
            Phase::Setup => &mut self.setup,
            Phase::Consumer => &mut self.consumer,
            Phase::Provider => &mut self.provider,
            Phase::Advanced => &mut self.advanced,
        };
        *slot = Some(spec);
    }

    pub fn configured(&self) -> impl Iterator<Item = (Phase, PhaseSpec)> + '_ {
        Phase::ALL
            .into_iter()
            .filter_map(move |phase| self.get(phase).map(|spec| (phase, spec)))
    }
}

/// How a server proves it can serve requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessProbe {
    /// `GET` the URL until any 2xx response
    HealthUrl(String),
    /// Wait for a stdout/stderr line containing this text
    LogPattern(String),
}

impl fmt::Display for ReadinessProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessProbe::HealthUrl(url) => write!(f, "health check {url}"),
            ReadinessProbe::LogPattern(pattern) => write!(f, "log pattern '{pattern}'"),
        }
    }
}

fn default_server_timeout_ms() -> u64 {
    10_000
}

/// A dependent server process managed for the duration of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Exported to the child as `PORT` when set
    #[serde(default)]
    pub port: Option<u16>,
    pub readiness: ReadinessProbe,
    #[serde(default = "default_server_timeout_ms")]
    pub timeout_ms: u64,
}

impl ServerSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, readiness: ReadinessProbe) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            port: None,
            readiness,
            timeout_ms: default_server_timeout_ms(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Environment handed to the child, including the injected `PORT`
    pub fn effective_env(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if let Some(port) = self.port {
            env.entry("PORT".to_string()).or_insert_with(|| port.to_string());
        }
        env
    }
}

/// Whole-suite configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub phases: PhasePlan,
    pub servers: Vec<ServerSpec>,
    /// Shared deadline for all servers to confirm readiness
    pub readiness_timeout_ms: u64,
    /// How long a SIGTERM'd server gets before SIGKILL
    pub shutdown_grace_ms: u64,
    pub health_poll_interval_ms: u64,
    /// Whether an advanced-phase failure fails the run
    pub advanced_affects_overall: bool,
    /// Directory holding generated contract files to list
    pub artifacts_dir: Option<PathBuf>,
    /// Kill whatever holds a configured server port before starting servers
    pub free_ports_before_start: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            phases: PhasePlan::default(),
            servers: Vec::new(),
            readiness_timeout_ms: 30_000,
            shutdown_grace_ms: 5_000,
            health_poll_interval_ms: 1_000,
            advanced_affects_overall: true,
            artifacts_dir: None,
            free_ports_before_start: false,
        }
    }
}

impl SuiteConfig {
    /// Create a new builder
    pub fn builder() -> crate::config::builder::SuiteConfigBuilder {
        crate::config::builder::SuiteConfigBuilder::new()
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(input: &str) -> OrchestratorResult<Self> {
        let config: SuiteConfig = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub async fn load(path: &Path) -> OrchestratorResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OrchestratorError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        for (phase, spec) in self.phases.configured() {
            if spec.command.trim().is_empty() {
                return Err(OrchestratorError::config(format!("phase '{phase}' has an empty command")));
            }
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(OrchestratorError::config("server with an empty name"));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(OrchestratorError::config(format!("duplicate server name '{}'", server.name)));
            }
            if server.command.trim().is_empty() {
                return Err(OrchestratorError::config(format!("server '{}' has an empty command", server.name)));
            }
            if server.timeout_ms == 0 {
                return Err(OrchestratorError::config(format!(
                    "server '{}' needs timeout_ms greater than zero",
                    server.name
                )));
            }
            validate_probe(&server.name, &server.readiness)?;
        }

        if self.readiness_timeout_ms == 0 {
            return Err(OrchestratorError::config("readiness_timeout_ms must be greater than zero"));
        }
        if self.health_poll_interval_ms == 0 {
            return Err(OrchestratorError::config("health_poll_interval_ms must be greater than zero"));
        }

        Ok(())
    }

    /// Names of the phases whose failure fails the run
    pub fn required_phases(&self) -> Vec<String> {
        self.phases
            .configured()
            .filter(|(phase, _)| *phase != Phase::Advanced || self.advanced_affects_overall)
            .map(|(_, spec)| spec.name)
            .collect()
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    pub fn server_ports(&self) -> Vec<u16> {
        self.servers.iter().filter_map(|s| s.port).collect()
    }
}

fn validate_probe(server: &str, probe: &ReadinessProbe) -> OrchestratorResult<()> {
    match probe {
        ReadinessProbe::HealthUrl(raw) => {
            let parsed = url::Url::parse(raw)
                .map_err(|e| OrchestratorError::config(format!("server '{server}' health URL '{raw}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(OrchestratorError::config(format!(
                    "server '{server}' health URL must be http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        ReadinessProbe::LogPattern(pattern) => {
            if pattern.is_empty() {
                return Err(OrchestratorError::config(format!("server '{server}' has an empty log pattern")));
            }
        }
    }
    Ok(())
}
