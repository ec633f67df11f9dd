//! Port cleanup before servers start
//!
//! A previous run that died hard can leave a server bound to its port. When
//! enabled, every configured server port is freed before spawning by
//! terminating whatever holds it (SIGTERM, short wait, SIGKILL).

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;

use shared::{Component, component_debug, component_info, component_warn};

/// Frees server ports held by stale processes
pub struct PortCleanup {
    ports: Vec<u16>,
    grace_period: Duration,
}

impl PortCleanup {
    pub fn new(ports: Vec<u16>) -> Self {
        Self {
            ports,
            grace_period: Duration::from_secs(2),
        }
    }

    /// Configure how long a stale holder gets after SIGTERM (fluent API)
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Free every target port. Best-effort: failures are logged, never returned.
    ///
    /// # Returns
    /// Number of processes terminated
    pub async fn free_ports(&self) -> usize {
        if self.ports.is_empty() {
            return 0;
        }

        component_info!(Component::Cleanup, "🧹 Freeing server ports: {:?}", self.ports);

        let mut terminated = 0;
        for &port in &self.ports {
            let pids = find_processes_using_port(port).await;
            if pids.is_empty() {
                component_debug!(Component::Cleanup, "✅ Port {} already free", port);
                continue;
            }

            for pid in pids {
                if pid == std::process::id() as i32 {
                    continue;
                }

                if self.kill_process_gracefully(pid).await {
                    component_info!(Component::Cleanup, "🔓 Terminated process {} holding port {}", pid, port);
                    terminated += 1;
                }
            }
        }

        terminated
    }

    /// SIGTERM, poll for exit, then SIGKILL. Returns whether the process is gone.
    async fn kill_process_gracefully(&self, pid: i32) -> bool {
        let nix_pid = Pid::from_raw(pid);

        match signal::kill(nix_pid, Signal::SIGTERM) {
            Ok(()) => {}
            Err(nix::errno::Errno::ESRCH) => return true,
            Err(e) => {
                component_warn!(Component::Cleanup, "⚠️ Failed to signal process {}: {}", pid, e);
                return false;
            }
        }

        let polls = (self.grace_period.as_millis() / 100).max(1);
        for _ in 0..polls {
            if !process_exists(pid) {
                return true;
            }
            sleep(Duration::from_millis(100)).await;
        }

        component_warn!(Component::Cleanup, "🔨 Process {} ignored SIGTERM, using SIGKILL", pid);
        if let Err(e) = signal::kill(nix_pid, Signal::SIGKILL) {
            component_warn!(Component::Cleanup, "⚠️ SIGKILL to {} failed: {}", pid, e);
        }

        sleep(Duration::from_millis(200)).await;
        !process_exists(pid)
    }
}

/// Check if a process exists (signal 0)
pub fn process_exists(pid: i32) -> bool {
    !matches!(signal::kill(Pid::from_raw(pid), None), Err(nix::errno::Errno::ESRCH))
}

/// PIDs listening on or connected through `port`, via `lsof`
async fn find_processes_using_port(port: u16) -> Vec<i32> {
    let output = match Command::new("lsof").arg("-ti").arg(format!(":{port}")).output().await {
        Ok(output) => output,
        Err(e) => {
            component_debug!(Component::Cleanup, "lsof unavailable: {}", e);
            return vec![];
        }
    };

    // lsof exits non-zero when nothing matches
    if !output.status.success() {
        return vec![];
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.trim().parse::<i32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_configuration() {
        let cleanup = PortCleanup::new(vec![3000, 3001]).with_grace_period(Duration::from_millis(300));

        assert_eq!(cleanup.ports(), &[3000, 3001]);
        assert_eq!(cleanup.grace_period, Duration::from_millis(300));
    }

    #[test]
    fn test_process_exists() {
        assert!(process_exists(std::process::id() as i32));
        // PIDs this high are not handed out on default Linux configs
        assert!(!process_exists(i32::MAX - 7));
    }

    #[tokio::test]
    async fn test_no_ports_is_a_no_op() {
        assert_eq!(PortCleanup::new(vec![]).free_ports().await, 0);
    }

    #[tokio::test]
    async fn test_unused_port_terminates_nothing() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert_eq!(PortCleanup::new(vec![port]).free_ports().await, 0);
    }

    #[tokio::test]
    async fn test_stale_holder_is_terminated() {
        let mut child = tokio::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id().unwrap() as i32;

        let cleanup = PortCleanup::new(vec![]).with_grace_period(Duration::from_millis(500));
        assert!(cleanup.kill_process_gracefully(pid).await || child.try_wait().unwrap().is_some());

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
