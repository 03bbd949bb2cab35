//! Background connectivity manager.
//!
//! [`ConnectivityManager`] owns the probe loop: every
//! [`PROBE_INTERVAL`] it drops idle devices from the active set, fans
//! out one probe per still-active device, and persists the verdicts on
//! the device rows. Created once at application startup via
//! [`ConnectivityManager::start`]; the returned `Arc` is cheap to clone
//! into request handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use labrack_core::types::DbId;
use labrack_db::models::device::Device;
use labrack_db::repositories::DeviceRepo;
use labrack_db::DbPool;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{ConnectivityCache, ConnectivityStatus};
use crate::probe::Prober;

/// How often the background loop wakes.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Owns the cache and the probe loop.
pub struct ConnectivityManager {
    cache: Arc<ConnectivityCache>,
    pool: DbPool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityManager {
    /// Build the cache and spawn the probe loop.
    pub fn start(pool: DbPool, prober: Arc<dyn Prober>) -> Arc<Self> {
        let cache = Arc::new(ConnectivityCache::new(prober));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_loop(
            Arc::clone(&cache),
            pool.clone(),
            cancel.clone(),
        ));

        Arc::new(Self {
            cache,
            pool,
            cancel,
            task: Mutex::new(Some(handle)),
        })
    }

    /// Current verdict for one device; probes on miss/stale and persists
    /// the fresh verdict.
    pub async fn status(&self, device: &Device) -> ConnectivityStatus {
        let lookup = self.cache.get(device.id, &device.ip_address).await;
        if lookup.probed {
            self.persist(device.id, &lookup.status).await;
        }
        lookup.status
    }

    /// Verdicts for a batch of devices, through the same cache.
    pub async fn status_many(&self, devices: &[Device]) -> HashMap<DbId, ConnectivityStatus> {
        let mut out = HashMap::with_capacity(devices.len());
        for device in devices {
            out.insert(device.id, self.status(device).await);
        }
        out
    }

    /// Stop the probe loop, waiting up to 5 seconds for a clean exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().expect("task slot poisoned").take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                tracing::warn!("Connectivity loop did not stop within 5s");
            }
        }
    }

    async fn persist(&self, device_id: DbId, status: &ConnectivityStatus) {
        if let Err(e) =
            DeviceRepo::update_connectivity(&self.pool, device_id, status.reachable, status.last_check)
                .await
        {
            tracing::warn!(device_id, error = %e, "Failed to persist connectivity verdict");
        }
    }
}

/// The probe loop: evict idle devices, probe the rest, persist verdicts.
///
/// A failing device or database error is logged and never aborts the
/// remaining work in the iteration.
async fn run_loop(cache: Arc<ConnectivityCache>, pool: DbPool, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(PROBE_INTERVAL);
    tracing::info!(
        interval_secs = PROBE_INTERVAL.as_secs(),
        "Connectivity probe loop started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Connectivity probe loop stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = cache.evict_inactive().await;
                if !evicted.is_empty() {
                    tracing::debug!(count = evicted.len(), "Dropped idle devices from active polling");
                }

                let active = cache.active_devices().await;
                if active.is_empty() {
                    continue;
                }

                let devices = match DeviceRepo::list_by_ids(&pool, &active).await {
                    Ok(devices) => devices,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to load active devices for probing");
                        continue;
                    }
                };

                let targets: Vec<(DbId, String)> = devices
                    .iter()
                    .map(|d| (d.id, d.ip_address.clone()))
                    .collect();
                let results = cache.refresh_many(&targets).await;

                for (device_id, status) in results {
                    if let Err(e) = DeviceRepo::update_connectivity(
                        &pool,
                        device_id,
                        status.reachable,
                        status.last_check,
                    )
                    .await
                    {
                        tracing::error!(device_id, error = %e, "Failed to persist connectivity verdict");
                    }
                }
            }
        }
    }
}
