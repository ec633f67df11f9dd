//! Service implementations
//!
//! Real implementations of the supervision, phase execution and artifact
//! listing traits. These spawn OS processes and touch the filesystem.

pub mod artifacts;
#[cfg(unix)]
pub mod cleanup;
pub mod output_handler;
pub mod phase_runner;
pub mod supervisor;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use artifacts::ContractDirectory;
#[cfg(unix)]
pub use cleanup::PortCleanup;
pub use phase_runner::{PhaseOutput, RealPhaseRunner};
pub use supervisor::RealServerSupervisor;
