//! Outcome of a single pipeline phase

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one phase command.
///
/// Every way a phase can end is representable here, including the command
/// never starting. Nothing about a phase failure is ever raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub name: String,
    pub success: bool,
    /// Absent when the command never started or was killed by a signal
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PhaseResult {
    /// Build a result from a finished command's exit code
    pub fn from_exit(name: impl Into<String>, exit_code: Option<i32>, elapsed: Duration) -> Self {
        let success = exit_code == Some(0);
        let error_message = match exit_code {
            Some(0) => None,
            Some(code) => Some(format!("exited with code {code}")),
            None => Some("terminated by signal".to_string()),
        };

        Self {
            name: name.into(),
            success,
            exit_code,
            duration_ms: duration_ms(elapsed),
            error_message,
        }
    }

    /// The command could not be started at all
    pub fn spawn_failed(name: impl Into<String>, error: impl std::fmt::Display, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            success: false,
            exit_code: None,
            duration_ms: duration_ms(elapsed),
            error_message: Some(format!("failed to start: {error}")),
        }
    }

    /// The run was interrupted while this phase was in flight
    pub fn interrupted(name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            success: false,
            exit_code: None,
            duration_ms: duration_ms(elapsed),
            error_message: Some("interrupted".to_string()),
        }
    }

    /// The phase blew up inside the runner itself
    pub fn crashed(name: impl Into<String>, reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            success: false,
            exit_code: None,
            duration_ms: duration_ms(elapsed),
            error_message: Some(reason.into()),
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.success { "PASS" } else { "FAIL" }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
