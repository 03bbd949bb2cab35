//! The connectivity verdict cache.
//!
//! One entry per device, refreshed by the background loop or by an
//! on-demand probe when a query misses or finds a stale entry. Querying
//! a device adds it to the active polling set; a device not queried for
//! [`ACTIVE_TIMEOUT`] drops out of the set and stops being probed (its
//! last verdict stays cached).
//!
//! Only one probe per device may be in flight: concurrent callers that
//! find a probe running wait on the same outcome through a watch
//! channel instead of issuing their own.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use labrack_core::types::{DbId, Timestamp};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::{Duration, Instant};

use crate::probe::Prober;

/// How long a cached verdict stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(15);

/// How long a device stays in the active polling set without queries.
pub const ACTIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// A reachability verdict for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityStatus {
    pub reachable: bool,
    pub last_check: Timestamp,
    pub last_probe: Timestamp,
}

/// Result of a cache lookup. `probed` is set when this call ran the
/// probe itself (as opposed to a cache hit or waiting on another
/// caller's probe), so the caller knows whether to persist the verdict.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub status: ConnectivityStatus,
    pub probed: bool,
}

#[derive(Clone)]
struct CacheEntry {
    status: ConnectivityStatus,
    /// Monotonic freshness stamp (respects paused time in tests).
    checked_at: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<DbId, CacheEntry>,
    last_access: HashMap<DbId, Instant>,
    active: HashSet<DbId>,
    in_flight: HashMap<DbId, watch::Receiver<Option<ConnectivityStatus>>>,
}

enum Ticket {
    Fresh(ConnectivityStatus),
    Wait(watch::Receiver<Option<ConnectivityStatus>>),
    Probe(watch::Sender<Option<ConnectivityStatus>>),
}

/// In-memory connectivity cache. Shared as `Arc<ConnectivityCache>`.
pub struct ConnectivityCache {
    inner: Mutex<CacheInner>,
    prober: Arc<dyn Prober>,
    ttl: Duration,
    active_timeout: Duration,
}

impl ConnectivityCache {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            prober,
            ttl: CACHE_TTL,
            active_timeout: ACTIVE_TIMEOUT,
        }
    }

    /// Query the verdict for one device, probing synchronously on a miss
    /// or stale entry. Also marks the device as actively polled.
    pub async fn get(&self, device_id: DbId, address: &str) -> Lookup {
        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.last_access.insert(device_id, Instant::now());
            inner.active.insert(device_id);

            let fresh = inner
                .entries
                .get(&device_id)
                .filter(|entry| entry.checked_at.elapsed() < self.ttl)
                .map(|entry| entry.status.clone());
            match fresh {
                Some(status) => Ticket::Fresh(status),
                None => self.begin_or_join(&mut inner, device_id),
            }
        };

        match ticket {
            Ticket::Fresh(status) => Lookup {
                status,
                probed: false,
            },
            Ticket::Wait(rx) => self.await_in_flight(device_id, address, rx).await,
            Ticket::Probe(tx) => {
                let status = self.probe_and_store(device_id, address).await;
                let _ = tx.send(Some(status.clone()));
                self.inner.lock().await.in_flight.remove(&device_id);
                Lookup {
                    status,
                    probed: true,
                }
            }
        }
    }

    /// Query verdicts for a batch of `(device_id, address)` pairs.
    ///
    /// Goes through the same cache as single queries, so a device probed
    /// for one caller is a cache hit for the next.
    pub async fn get_many(&self, targets: &[(DbId, String)]) -> Vec<(DbId, Lookup)> {
        let mut results = Vec::with_capacity(targets.len());
        for (device_id, address) in targets {
            results.push((*device_id, self.get(*device_id, address).await));
        }
        results
    }

    /// Drop devices not queried within the active timeout from the
    /// polling set. Their cached verdicts are retained. Returns the
    /// evicted ids.
    pub async fn evict_inactive(&self) -> Vec<DbId> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<DbId> = inner
            .active
            .iter()
            .copied()
            .filter(|id| {
                inner
                    .last_access
                    .get(id)
                    .map_or(true, |t| t.elapsed() > self.active_timeout)
            })
            .collect();
        for id in &expired {
            inner.active.remove(id);
            inner.last_access.remove(id);
        }
        expired
    }

    /// Devices currently in the active polling set.
    pub async fn active_devices(&self) -> Vec<DbId> {
        let inner = self.inner.lock().await;
        inner.active.iter().copied().collect()
    }

    /// Probe a batch of devices concurrently (the background loop's fan
    /// out). Devices with a probe already in flight are skipped; their
    /// result belongs to the caller that started it.
    pub async fn refresh_many(&self, targets: &[(DbId, String)]) -> Vec<(DbId, ConnectivityStatus)> {
        let refreshes = targets
            .iter()
            .map(|(device_id, address)| self.refresh_one(*device_id, address));
        futures::future::join_all(refreshes)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn refresh_one(
        &self,
        device_id: DbId,
        address: &str,
    ) -> Option<(DbId, ConnectivityStatus)> {
        let tx = {
            let mut inner = self.inner.lock().await;
            match self.begin_or_join(&mut inner, device_id) {
                Ticket::Probe(tx) => tx,
                // Another probe is running; don't double-probe.
                _ => return None,
            }
        };

        let status = self.probe_and_store(device_id, address).await;
        let _ = tx.send(Some(status.clone()));
        self.inner.lock().await.in_flight.remove(&device_id);
        Some((device_id, status))
    }

    fn begin_or_join(&self, inner: &mut CacheInner, device_id: DbId) -> Ticket {
        if let Some(rx) = inner.in_flight.get(&device_id) {
            Ticket::Wait(rx.clone())
        } else {
            let (tx, rx) = watch::channel(None);
            inner.in_flight.insert(device_id, rx);
            Ticket::Probe(tx)
        }
    }

    async fn await_in_flight(
        &self,
        device_id: DbId,
        address: &str,
        mut rx: watch::Receiver<Option<ConnectivityStatus>>,
    ) -> Lookup {
        loop {
            if let Some(status) = rx.borrow().clone() {
                return Lookup {
                    status,
                    probed: false,
                };
            }
            if rx.changed().await.is_err() {
                // The probing task died without publishing. Clear the
                // stale slot (unless a newer probe replaced it) and
                // probe directly.
                {
                    let mut inner = self.inner.lock().await;
                    if inner
                        .in_flight
                        .get(&device_id)
                        .is_some_and(|cur| cur.same_channel(&rx))
                    {
                        inner.in_flight.remove(&device_id);
                    }
                }
                let status = self.probe_and_store(device_id, address).await;
                return Lookup {
                    status,
                    probed: true,
                };
            }
        }
    }

    async fn probe_and_store(&self, device_id: DbId, address: &str) -> ConnectivityStatus {
        let reachable = self.prober.probe(address).await;
        let now: Timestamp = Utc::now();
        let status = ConnectivityStatus {
            reachable,
            last_check: now,
            last_probe: now,
        };
        let mut inner = self.inner.lock().await;
        inner.entries.insert(
            device_id,
            CacheEntry {
                status: status.clone(),
                checked_at: Instant::now(),
            },
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProber {
        reachable: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeProber {
        fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self {
                reachable,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(reachable: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reachable,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn probe(&self, _address: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reachable
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_verdict_is_reused_within_ttl() {
        let prober = FakeProber::new(true);
        let cache = ConnectivityCache::new(prober.clone());

        let first = cache.get(1, "10.0.0.1").await;
        assert!(first.probed);
        assert!(first.status.reachable);

        let second = cache.get(1, "10.0.0.1").await;
        assert!(!second.probed);
        assert_eq!(second.status, first.status);
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_triggers_reprobe() {
        let prober = FakeProber::new(true);
        let cache = ConnectivityCache::new(prober.clone());

        cache.get(1, "10.0.0.1").await;
        tokio::time::advance(CACHE_TTL + Duration::from_secs(1)).await;

        let lookup = cache.get(1, "10.0.0.1").await;
        assert!(lookup.probed);
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_probe() {
        let prober = FakeProber::slow(true, Duration::from_millis(500));
        let cache = Arc::new(ConnectivityCache::new(prober.clone()));

        let a = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(1, "10.0.0.1").await })
        };
        let b = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(1, "10.0.0.1").await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(prober.calls(), 1);
        assert_eq!(a.status, b.status);
        // Exactly one of the two actually ran the probe.
        assert_eq!(usize::from(a.probed) + usize::from(b.probed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_devices_leave_the_active_set() {
        let prober = FakeProber::new(true);
        let cache = ConnectivityCache::new(prober.clone());

        cache.get(7, "10.0.0.7").await;
        assert_eq!(cache.active_devices().await, vec![7]);

        tokio::time::advance(ACTIVE_TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(cache.evict_inactive().await, vec![7]);
        assert!(cache.active_devices().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn recently_queried_devices_stay_active() {
        let prober = FakeProber::new(true);
        let cache = ConnectivityCache::new(prober.clone());

        cache.get(7, "10.0.0.7").await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.evict_inactive().await.is_empty());
        assert_eq!(cache.active_devices().await, vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reads_unreachable() {
        let prober = FakeProber::new(false);
        let cache = ConnectivityCache::new(prober);

        let lookup = cache.get(1, "10.0.0.1").await;
        assert!(!lookup.status.reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_many_probes_each_device_once() {
        let prober = FakeProber::new(true);
        let cache = ConnectivityCache::new(prober.clone());

        let targets = vec![(1, "10.0.0.1".to_string()), (2, "10.0.0.2".to_string())];
        let results = cache.refresh_many(&targets).await;
        assert_eq!(results.len(), 2);
        assert_eq!(prober.calls(), 2);

        // Fresh entries from the sweep satisfy queries without probing.
        let lookup = cache.get(1, "10.0.0.1").await;
        assert!(!lookup.probed);
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_queries_share_the_cache() {
        let prober = FakeProber::new(true);
        let cache = ConnectivityCache::new(prober.clone());

        cache.get(1, "10.0.0.1").await;
        let results = cache
            .get_many(&[(1, "10.0.0.1".to_string()), (2, "10.0.0.2".to_string())])
            .await;
        assert_eq!(results.len(), 2);
        // Device 1 was fresh; only device 2 needed a probe.
        assert_eq!(prober.calls(), 2);
    }
}
