//! Whole-run outcome and its single-writer builder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};
use crate::results::{ArtifactInfo, PhaseResult};
use crate::types::ServerSnapshot;

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuiteStatus {
    Pass,
    Fail,
}

impl fmt::Display for SuiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteStatus::Pass => write!(f, "PASS"),
            SuiteStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Why a server warning was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Readiness was not confirmed before the timeout; process left running
    Degraded,
    /// The server process could not be started
    SpawnFailed,
    /// The server process exited before becoming ready
    Failed,
}

/// Non-fatal server problem attached to the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteWarning {
    pub server: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Structured outcome of one suite run, handed to the report collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub run_id: Uuid,
    pub phases: Vec<PhaseResult>,
    pub overall: SuiteStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub warnings: Vec<SuiteWarning>,
    pub servers: Vec<ServerSnapshot>,
    pub artifacts: Vec<ArtifactInfo>,
    pub interrupted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuiteResult {
    pub fn is_pass(&self) -> bool {
        self.overall == SuiteStatus::Pass
    }

    /// Process exit code for the host binary
    pub fn exit_code(&self) -> i32 {
        if self.is_pass() { 0 } else { 1 }
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Human-readable summary table, one entry per line
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.phases.len() + self.warnings.len() + 3);
        lines.push("========================".to_string());

        for phase in &self.phases {
            let mut line = format!("{} {}: {}ms", phase.status_label(), phase.name.to_uppercase(), phase.duration_ms);
            if let Some(ref message) = phase.error_message {
                line.push_str(&format!(" ({message})"));
            }
            lines.push(line);
        }

        for warning in &self.warnings {
            lines.push(format!("WARN {}: {}", warning.server, warning.message));
        }

        lines.push("========================".to_string());

        let passed = self.phases.iter().filter(|p| p.success).count();
        lines.push(format!(
            "OVERALL {}: {}/{} phases passed in {}ms",
            self.overall,
            passed,
            self.phases.len(),
            self.duration_ms
        ));

        lines
    }

    pub fn to_json_pretty(&self) -> SharedResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SharedError::SerializationError { message: e.to_string() })
    }

    pub fn from_json(input: &str) -> SharedResult<Self> {
        serde_json::from_str(input).map_err(|e| SharedError::DeserializationError { message: e.to_string() })
    }
}

/// Incrementally assembles a [`SuiteResult`].
///
/// `overall` is derived at `finish` time from the required phase names given
/// up front: the run passes only if every required phase was recorded and
/// succeeded.
#[derive(Debug)]
pub struct SuiteResultBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    clock: Instant,
    required: Vec<String>,
    phases: Vec<PhaseResult>,
    warnings: Vec<SuiteWarning>,
    servers: Vec<ServerSnapshot>,
    artifacts: Vec<ArtifactInfo>,
    interrupted: bool,
    error: Option<String>,
}

impl SuiteResultBuilder {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: Instant::now(),
            required: required.into_iter().map(Into::into).collect(),
            phases: Vec::new(),
            warnings: Vec::new(),
            servers: Vec::new(),
            artifacts: Vec::new(),
            interrupted: false,
            error: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_phase(&mut self, result: PhaseResult) {
        self.phases.push(result);
    }

    pub fn phases(&self) -> &[PhaseResult] {
        &self.phases
    }

    pub fn warn(&mut self, server: impl Into<String>, kind: WarningKind, message: impl Into<String>) {
        self.warnings.push(SuiteWarning {
            server: server.into(),
            kind,
            message: message.into(),
        });
    }

    pub fn set_servers(&mut self, servers: Vec<ServerSnapshot>) {
        self.servers = servers;
    }

    pub fn set_artifacts(&mut self, artifacts: Vec<ArtifactInfo>) {
        self.artifacts = artifacts;
    }

    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Verdict given what has been recorded so far
    pub fn overall(&self) -> SuiteStatus {
        // An interrupted or aborted run never passes, whatever got recorded
        if self.interrupted || self.error.is_some() {
            return SuiteStatus::Fail;
        }

        let all_required_passed = self.required.iter().all(|name| {
            self.phases
                .iter()
                .any(|phase| &phase.name == name && phase.success)
        });
        let any_required_failed = self
            .phases
            .iter()
            .any(|phase| !phase.success && self.required.contains(&phase.name));

        if all_required_passed && !any_required_failed {
            SuiteStatus::Pass
        } else {
            SuiteStatus::Fail
        }
    }

    pub fn finish(self) -> SuiteResult {
        let overall = self.overall();
        let duration_ms = u64::try_from(self.clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        SuiteResult {
            run_id: self.run_id,
            phases: self.phases,
            overall,
            started_at: self.started_at,
            duration_ms,
            warnings: self.warnings,
            servers: self.servers,
            artifacts: self.artifacts,
            interrupted: self.interrupted,
            error: self.error,
        }
    }
}
