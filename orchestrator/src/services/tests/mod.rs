//! Service-specific tests
//!
//! Exercise the real supervisor against short-lived `sh` processes and a
//! local axum health endpoint.


// Common test utilities for services
pub mod common {
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::config::{ReadinessProbe, ServerSpec};
    use crate::services::RealServerSupervisor;

    /// Upper bound for any single supervisor call in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await.expect("operation timed out")
    }

    /// Supervisor tuned for fast tests
    pub fn fast_supervisor() -> RealServerSupervisor {
        RealServerSupervisor::new()
            .with_grace_period(Duration::from_millis(500))
            .with_poll_interval(Duration::from_millis(25))
    }

    /// A server whose whole body is a shell script
    pub fn sh_server(name: &str, script: &str, readiness: ReadinessProbe) -> ServerSpec {
        ServerSpec::new(name, "sh", readiness)
            .args(["-c", script])
            .timeout(Duration::from_secs(3))
    }
}
