//! Reachability probing.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Upper bound for a single probe attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Seam to the external reachability check.
///
/// Probe failure, spawn failure, and timeout all read as unreachable;
/// the cache layer never sees an error from here.
#[async_trait]
pub trait Prober: Send + Sync + 'static {
    async fn probe(&self, address: &str) -> bool;
}

/// ICMP prober shelling out to the system `ping` binary.
pub struct PingProber {
    timeout: Duration,
}

impl PingProber {
    pub fn new() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, address: &str) -> bool {
        let deadline_secs = self.timeout.as_secs().max(1).to_string();
        let mut command = Command::new("ping");
        command
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(&deadline_secs)
            .arg(address)
            .kill_on_drop(true);
        let output = command.output();

        // Give ping a little slack beyond its own -W deadline before
        // declaring the probe dead.
        match tokio::time::timeout(self.timeout + Duration::from_secs(2), output).await {
            Ok(Ok(output)) => output.status.success(),
            Ok(Err(e)) => {
                tracing::error!(address, error = %e, "Failed to spawn ping");
                false
            }
            Err(_) => {
                tracing::warn!(address, "Ping probe timed out");
                false
            }
        }
    }
}
