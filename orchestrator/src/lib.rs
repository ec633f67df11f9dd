//! Contract test-suite orchestrator
//!
//! Runs consumer contract tests, starts the provider servers they describe,
//! verifies the provider against the generated contracts and reports one
//! pass/fail verdict. Servers are always released, whatever happens.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{Phase, PhaseSpec, ReadinessProbe, ServerSpec, SuiteConfig, SuiteConfigBuilder};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Stage, TestOrchestrator};
pub use traits::{ArtifactSource, PhaseRunner, ServerSupervisor};
