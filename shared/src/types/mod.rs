//! Core types used throughout the suite runner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies which part of the runner emitted a log line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// The pipeline driver
    Orchestrator,
    /// Server process registry and readiness watchers
    Supervisor,
    /// Phase command execution
    PhaseRunner,
    /// Contract file listing
    Artifacts,
    /// Port cleanup before servers start
    Cleanup,
    /// Output forwarded from a managed server
    Server(String),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Orchestrator => write!(f, "orchestrator"),
            Component::Supervisor => write!(f, "supervisor"),
            Component::PhaseRunner => write!(f, "phase_runner"),
            Component::Artifacts => write!(f, "artifacts"),
            Component::Cleanup => write!(f, "cleanup"),
            Component::Server(name) => write!(f, "server:{name}"),
        }
    }
}

/// Lifecycle state of a managed server process.
///
/// States only ever move forward:
///
/// ```text
/// Starting ─┬─> Ready ────┐
///           ├─> Degraded ─┼─> Stopping ─> Stopped
///           ├─────────────┘
///           └─> Failed ──────────────────> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Ready,
    Degraded,
    Failed,
    Stopping,
    Stopped,
}

impl ProcessState {
    /// Whether `next` is a legal forward transition from `self`
    pub fn can_advance_to(self, next: ProcessState) -> bool {
        use ProcessState::*;

        matches!(
            (self, next),
            (Starting, Ready)
                | (Starting, Degraded)
                | (Starting, Failed)
                | (Starting, Stopping)
                | (Ready, Stopping)
                | (Degraded, Stopping)
                | (Failed, Stopped)
                | (Stopping, Stopped)
        )
    }

    /// Readiness has been decided one way or another
    pub fn is_settled(self) -> bool {
        !matches!(self, ProcessState::Starting)
    }

    pub fn is_stopped(self) -> bool {
        matches!(self, ProcessState::Stopped)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessState::Starting => "starting",
            ProcessState::Ready => "ready",
            ProcessState::Degraded => "degraded",
            ProcessState::Failed => "failed",
            ProcessState::Stopping => "stopping",
            ProcessState::Stopped => "stopped",
        };
        write!(f, "{label}")
    }
}

/// Point-in-time view of one managed server process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub port: Option<u16>,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_display() {
        assert_eq!(Component::Orchestrator.to_string(), "orchestrator");
        assert_eq!(Component::PhaseRunner.to_string(), "phase_runner");
        assert_eq!(Component::Server("MainProvider".to_string()).to_string(), "server:MainProvider");
    }

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(ProcessState::Starting.can_advance_to(ProcessState::Ready));
        assert!(ProcessState::Starting.can_advance_to(ProcessState::Degraded));
        assert!(ProcessState::Starting.can_advance_to(ProcessState::Failed));
        assert!(ProcessState::Ready.can_advance_to(ProcessState::Stopping));
        assert!(ProcessState::Degraded.can_advance_to(ProcessState::Stopping));
        assert!(ProcessState::Stopping.can_advance_to(ProcessState::Stopped));
        assert!(ProcessState::Failed.can_advance_to(ProcessState::Stopped));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!ProcessState::Ready.can_advance_to(ProcessState::Starting));
        assert!(!ProcessState::Degraded.can_advance_to(ProcessState::Ready));
        assert!(!ProcessState::Stopped.can_advance_to(ProcessState::Stopping));
        assert!(!ProcessState::Stopping.can_advance_to(ProcessState::Ready));
        assert!(!ProcessState::Stopped.can_advance_to(ProcessState::Stopped));
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessState::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
