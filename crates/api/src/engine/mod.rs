//! The reservation engine.
//!
//! [`Engine`] orchestrates every state transition: it serializes work
//! per device through [`locks::DeviceLocks`], runs the pure transitions
//! from `labrack-core` against loaded records, persists the results with
//! guarded updates, and performs the cross-component side effects
//! (share revocation, access registry, usage history, notifications).
//!
//! The background scheduler depends on the same engine handle as the
//! HTTP handlers — it is injected at startup, never imported back.

pub mod locks;

mod access;
mod sharing;
mod usage;

pub use sharing::{SharePayload, VisibilityCascade};
pub use usage::{QueuePayload, ReclaimSummary, UsagePayload};

use std::sync::Arc;

use labrack_core::error::CoreError;
use labrack_core::types::{DbId, Timestamp};
use labrack_core::usage::UsageState;
use labrack_db::models::device::Device;
use labrack_db::models::usage::UsageRecord;
use labrack_db::repositories::{DeviceRepo, UsageRepo};
use labrack_db::DbPool;
use labrack_events::EventBus;

use crate::error::{AppError, AppResult};

/// Actor recorded on transitions the scheduler makes on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// Shared engine handle. Cheap to clone via `Arc`.
pub struct Engine {
    pool: DbPool,
    locks: locks::DeviceLocks,
    events: Arc<EventBus>,
}

impl Engine {
    pub fn new(pool: DbPool, events: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            locks: locks::DeviceLocks::new(),
            events,
        })
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) async fn lock(&self, device_id: DbId) -> tokio::sync::OwnedMutexGuard<()> {
        self.locks.acquire(device_id).await
    }

    /// Load a device or fail `NotFound`.
    pub(crate) async fn device(&self, device_id: DbId) -> AppResult<Device> {
        DeviceRepo::find_by_id(&self.pool, device_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "device",
                    id: device_id,
                }
                .into()
            })
    }

    /// Load the usage record that must already exist for an operation.
    pub(crate) async fn usage_record(&self, device_id: DbId) -> AppResult<UsageRecord> {
        UsageRepo::find_by_device(&self.pool, device_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "usage record",
                    id: device_id,
                }
                .into()
            })
    }

    /// Persist a state image under the caller's device lock.
    ///
    /// The guard failing means something wrote the row outside the lock;
    /// surface it rather than overwrite.
    pub(crate) async fn save_state(
        &self,
        device_id: DbId,
        state: &UsageState,
        guard: Timestamp,
    ) -> AppResult<UsageRecord> {
        UsageRepo::save_state(&self.pool, device_id, state, guard)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "Usage record for device {device_id} changed concurrently"
                ))
            })
    }
}
