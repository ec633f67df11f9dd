//! Shared types for the contract test-suite runner
//!
//! Contains the data model handed between the supervisor, the phase runner,
//! the pipeline and whatever renders the final report. Nothing in here spawns
//! processes or touches the network.

pub mod errors;
pub mod logging;
pub mod results;
pub mod types;

pub use errors::*;
pub use types::*;

pub use results::{
    // Artifact listing handed to the report collector
    ArtifactInfo,

    // Per-phase outcome
    PhaseResult,

    // Whole-run outcome
    SuiteResult, SuiteResultBuilder, SuiteStatus, SuiteWarning, WarningKind,
};
