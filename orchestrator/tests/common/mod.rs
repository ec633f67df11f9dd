//! Common test utilities and infrastructure
//!
//! Shared fixtures, mock presets and fakes used across the orchestrator
//! test suites.

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
#[allow(unused_imports)]
pub use helpers::{RecordingSupervisor, ScriptedRunner, Step, TestHelpers};
