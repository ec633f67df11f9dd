//! Result types produced by a suite run
//!
//! These are plain data: the pipeline builds them, the report collector
//! reads them. Serialized with camelCase keys.

pub mod artifact;
pub mod phase;
pub mod suite;

pub use artifact::ArtifactInfo;
pub use phase::PhaseResult;
pub use suite::{SuiteResult, SuiteResultBuilder, SuiteStatus, SuiteWarning, WarningKind};
