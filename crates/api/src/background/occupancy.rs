//! Occupancy-limit enforcement.
//!
//! Every minute, devices held past their configured maximum-occupancy
//! duration are rotated to the next queued holder. A device with an
//! empty queue is never touched, no matter how long it has been held.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::Engine;

/// How often the enforcement loop runs.
pub const ROTATION_INTERVAL: Duration = Duration::from_secs(60);

/// Run the occupancy-limit enforcement loop until cancelled.
pub async fn run(engine: Arc<Engine>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(ROTATION_INTERVAL);
    tracing::info!(
        interval_secs = ROTATION_INTERVAL.as_secs(),
        "Occupancy-limit enforcement started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Occupancy-limit enforcement stopping");
                break;
            }
            _ = interval.tick() => {
                match engine.rotate_overdue().await {
                    Ok(0) => tracing::debug!("No devices past their occupancy limit"),
                    Ok(rotated) => tracing::info!(rotated, "Rotated overdue devices"),
                    Err(e) => tracing::error!(error = %e, "Occupancy enforcement cycle failed"),
                }
            }
        }
    }
}
