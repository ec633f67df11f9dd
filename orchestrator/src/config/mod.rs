//! Configuration Management
//!
//! Typed suite configuration loaded from JSON, plus a builder for tests and
//! embedding.

pub mod builder;
pub mod suite;

// Re-export main types
pub use builder::SuiteConfigBuilder;
pub use suite::{Phase, PhasePlan, PhaseSpec, ReadinessProbe, ServerSpec, SuiteConfig};
