//! Occupancy operations: use, long-term use, release, preempt, queue
//! edits, and the two reclamation entry points the scheduler drives.

use chrono::Utc;
use labrack_core::error::CoreError;
use labrack_core::status::DeviceStatus;
use labrack_core::types::{DbId, Timestamp};
use labrack_core::usage::{Reclaimed, UsageState, DEFAULT_EXPECTED_MINUTES};
use labrack_core::{identity, reclamation};
use labrack_db::models::device::Device;
use labrack_db::models::history::OpenUsageHistory;
use labrack_db::repositories::{DeviceRepo, UsageHistoryRepo, UsageRepo};
use serde::Serialize;

use crate::engine::{Engine, SYSTEM_ACTOR};
use crate::error::AppResult;
use labrack_events::{kinds, DeviceEvent};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Usage view returned by occupancy operations.
#[derive(Debug, Serialize)]
pub struct UsagePayload {
    pub device_id: DbId,
    pub status: DeviceStatus,
    pub holder: Option<String>,
    pub start_time: Option<Timestamp>,
    /// Elapsed hold time in minutes, rounded up, minimum 1 while held.
    pub occupied_minutes: i64,
    pub expected_minutes: i32,
    pub is_long_term: bool,
    pub long_term_end: Option<Timestamp>,
    pub long_term_purpose: Option<String>,
    pub queue: Vec<String>,
    pub queue_count: usize,
}

impl UsagePayload {
    fn from_state(device_id: DbId, state: &UsageState, now: Timestamp) -> Self {
        Self {
            device_id,
            status: state.status,
            holder: state.holder.clone(),
            start_time: state.start_time,
            occupied_minutes: state.occupied_minutes(now),
            expected_minutes: state.expected_minutes,
            is_long_term: state.is_long_term,
            long_term_end: state.long_term_end,
            long_term_purpose: state.long_term_purpose.clone(),
            queue: state.queue.clone(),
            queue_count: state.queue.len(),
        }
    }
}

/// Result of a queue join.
#[derive(Debug, Serialize)]
pub struct QueuePayload {
    /// 1-based position in the wait queue.
    pub position: usize,
    pub queue_count: usize,
}

/// Tally of a bulk reclamation sweep.
#[derive(Debug, Default, Serialize)]
pub struct ReclaimSummary {
    pub devices_released: usize,
    pub queues_cleared: usize,
    pub skipped_long_term: usize,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Engine {
    /// Occupy an available device.
    pub async fn use_device(
        &self,
        device_id: DbId,
        actor: &str,
        expected_minutes: Option<i32>,
        purpose: Option<String>,
    ) -> AppResult<UsagePayload> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let record = UsageRepo::find_or_create(self.pool(), device_id).await?;
        let mut state = record.to_state()?;
        let now = Utc::now();

        state.occupy(
            actor,
            expected_minutes.unwrap_or(DEFAULT_EXPECTED_MINUTES),
            now,
        )?;
        self.save_state(device_id, &state, record.updated_at).await?;

        UsageHistoryRepo::open(
            self.pool(),
            &OpenUsageHistory {
                device_id,
                holder: actor.to_string(),
                start_time: now,
                purpose,
            },
        )
        .await?;
        self.grant_occupant(&device, actor).await?;

        self.events().publish(
            DeviceEvent::new(kinds::DEVICE_OCCUPIED, device.id, &device.name)
                .notify(actor)
                .with_message(format!("{} is now held by {actor}", device.name)),
        );

        Ok(UsagePayload::from_state(device_id, &state, now))
    }

    /// Occupy an available device with a scheduled end date, exempting
    /// it from the daily cleanup until that date passes.
    pub async fn long_term_use(
        &self,
        device_id: DbId,
        actor: &str,
        end: Timestamp,
        purpose: Option<String>,
    ) -> AppResult<UsagePayload> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let record = UsageRepo::find_or_create(self.pool(), device_id).await?;
        let mut state = record.to_state()?;
        let now = Utc::now();

        state.occupy_long_term(actor, end, purpose.clone(), now)?;
        self.save_state(device_id, &state, record.updated_at).await?;

        UsageHistoryRepo::open(
            self.pool(),
            &OpenUsageHistory {
                device_id,
                holder: actor.to_string(),
                start_time: now,
                purpose,
            },
        )
        .await?;
        self.grant_occupant(&device, actor).await?;

        self.events().publish(
            DeviceEvent::new(kinds::DEVICE_OCCUPIED, device.id, &device.name)
                .notify(actor)
                .with_message(format!(
                    "{} is held long-term by {actor} until {end}",
                    device.name
                )),
        );

        Ok(UsagePayload::from_state(device_id, &state, now))
    }

    /// End the current hold. Only the holder (or an elevated actor) may
    /// release; the queue head, if any, becomes the new holder.
    pub async fn release(
        &self,
        device_id: DbId,
        actor: &str,
        elevated: bool,
    ) -> AppResult<UsagePayload> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let record = self.usage_record(device_id).await?;
        let mut state = record.to_state()?;
        let now = Utc::now();

        if let Some(holder) = &state.holder {
            if !identity::eq(holder, actor) && !elevated {
                return Err(CoreError::PermissionDenied(
                    "Only the current holder can release this device".to_string(),
                )
                .into());
            }
        }

        let held_minutes = state.occupied_minutes(now);
        let released = state.release(now)?;

        // Approved shares were only meaningful relative to the old
        // holder; revoke them before anything else observes the change.
        self.revoke_all_approved(&device, actor, "holder released the device")
            .await?;
        self.save_state(device_id, &state, record.updated_at).await?;

        UsageHistoryRepo::close_open(
            self.pool(),
            device_id,
            &released.previous_holder,
            now,
            held_minutes as i32,
        )
        .await?;
        self.clear_access(&device, &released.previous_holder).await?;

        match &released.next_holder {
            Some(next) => {
                UsageHistoryRepo::open(
                    self.pool(),
                    &OpenUsageHistory {
                        device_id,
                        holder: next.clone(),
                        start_time: now,
                        purpose: None,
                    },
                )
                .await?;
                self.grant_occupant(&device, next).await?;

                self.events().publish(
                    DeviceEvent::new(kinds::DEVICE_REASSIGNED, device.id, &device.name)
                        .notify(next)
                        .with_message(format!(
                            "{} was released by {} and is now yours",
                            device.name, released.previous_holder
                        )),
                );
            }
            None => {
                self.events().publish(
                    DeviceEvent::new(kinds::DEVICE_RELEASED, device.id, &device.name)
                        .notify(&released.previous_holder)
                        .with_message(format!("{} is available again", device.name)),
                );
            }
        }

        Ok(UsagePayload::from_state(device_id, &state, now))
    }

    /// Forcibly take the device; the displaced holder moves to the head
    /// of the queue. Falls back to a plain occupation when available.
    pub async fn preempt(
        &self,
        device_id: DbId,
        actor: &str,
        expected_minutes: Option<i32>,
        purpose: Option<String>,
    ) -> AppResult<UsagePayload> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let record = UsageRepo::find_or_create(self.pool(), device_id).await?;
        let mut state = record.to_state()?;
        let now = Utc::now();

        let held_minutes = state.occupied_minutes(now);
        let preempted = state.preempt(
            actor,
            expected_minutes.unwrap_or(DEFAULT_EXPECTED_MINUTES),
            now,
        )?;

        if preempted.displaced.is_some() {
            self.revoke_all_approved(&device, actor, "device was preempted")
                .await?;
        }
        self.save_state(device_id, &state, record.updated_at).await?;

        if let Some(displaced) = &preempted.displaced {
            UsageHistoryRepo::close_open(
                self.pool(),
                device_id,
                displaced,
                now,
                held_minutes as i32,
            )
            .await?;
            self.clear_access(&device, displaced).await?;
        }

        UsageHistoryRepo::open(
            self.pool(),
            &OpenUsageHistory {
                device_id,
                holder: actor.to_string(),
                start_time: now,
                purpose,
            },
        )
        .await?;
        self.grant_occupant(&device, actor).await?;

        match &preempted.displaced {
            Some(displaced) => self.events().publish(
                DeviceEvent::new(kinds::DEVICE_PREEMPTED, device.id, &device.name)
                    .notify(displaced)
                    .with_message(format!(
                        "{} was preempted by {actor}; you are now first in the queue",
                        device.name
                    )),
            ),
            None => self.events().publish(
                DeviceEvent::new(kinds::DEVICE_OCCUPIED, device.id, &device.name)
                    .notify(actor)
                    .with_message(format!("{} is now held by {actor}", device.name)),
            ),
        }

        Ok(UsagePayload::from_state(device_id, &state, now))
    }

    /// Join the wait queue. Priority insertion is restricted to
    /// elevated actors.
    pub async fn enqueue(
        &self,
        device_id: DbId,
        actor: &str,
        priority: bool,
        elevated: bool,
    ) -> AppResult<QueuePayload> {
        if priority && !elevated {
            return Err(CoreError::PermissionDenied(
                "Priority queueing requires an elevated role".to_string(),
            )
            .into());
        }

        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let record = UsageRepo::find_or_create(self.pool(), device_id).await?;
        let mut state = record.to_state()?;

        let position = if priority {
            state.enqueue_priority(actor, device.support_queue)?
        } else {
            state.enqueue(actor, device.support_queue)?
        };
        self.save_state(device_id, &state, record.updated_at).await?;

        Ok(QueuePayload {
            position,
            queue_count: state.queue.len(),
        })
    }

    /// Leave the wait queue.
    pub async fn cancel_queue(&self, device_id: DbId, actor: &str) -> AppResult<UsagePayload> {
        let _guard = self.lock(device_id).await;
        self.device(device_id).await?;
        let record = self.usage_record(device_id).await?;
        let mut state = record.to_state()?;
        let now = Utc::now();

        state.cancel_queue(actor)?;
        self.save_state(device_id, &state, record.updated_at).await?;

        Ok(UsagePayload::from_state(device_id, &state, now))
    }

    /// Read-only usage view (creates the default record lazily).
    pub async fn usage_view(&self, device_id: DbId) -> AppResult<UsagePayload> {
        self.device(device_id).await?;
        let record = UsageRepo::find_or_create(self.pool(), device_id).await?;
        let state = record.to_state()?;
        Ok(UsagePayload::from_state(device_id, &state, Utc::now()))
    }

    // -----------------------------------------------------------------------
    // Scheduler entry points
    // -----------------------------------------------------------------------

    /// Clear every non-exempt usage record. With `force`, unexpired
    /// long-term holds are cleared too (admin force-cleanup).
    ///
    /// A failure on one device is logged and never aborts the sweep.
    pub async fn force_reclaim_all(&self, force: bool, actor: &str) -> AppResult<ReclaimSummary> {
        let records = UsageRepo::list_all(self.pool()).await?;
        let mut summary = ReclaimSummary::default();

        for record in records {
            match self.reclaim_device(record.device_id, force, actor).await {
                Ok(Some(Reclaimed::Skipped)) => summary.skipped_long_term += 1,
                Ok(Some(Reclaimed::Cleared {
                    previous_holder,
                    cleared_queue,
                })) => {
                    if previous_holder.is_some() {
                        summary.devices_released += 1;
                    }
                    if !cleared_queue.is_empty() {
                        summary.queues_cleared += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        device_id = record.device_id,
                        error = %e,
                        "Reclamation failed for device; continuing"
                    );
                }
            }
        }

        tracing::info!(
            force,
            released = summary.devices_released,
            queues_cleared = summary.queues_cleared,
            skipped = summary.skipped_long_term,
            "Reclamation sweep finished"
        );
        Ok(summary)
    }

    /// Reclaim one device under its lock. Returns `None` when the
    /// record was already idle and nothing changed.
    async fn reclaim_device(
        &self,
        device_id: DbId,
        force: bool,
        actor: &str,
    ) -> AppResult<Option<Reclaimed>> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let Some(record) = UsageRepo::find_by_device(self.pool(), device_id).await? else {
            return Ok(None);
        };
        let mut state = record.to_state()?;
        let now = Utc::now();

        // Nothing to clear; skip the write and the notifications.
        if state.status == DeviceStatus::Available && state.holder.is_none() && state.queue.is_empty()
        {
            return Ok(None);
        }

        let held_minutes = state.occupied_minutes(now);
        let outcome = state.reclaim(force, now);

        if let Reclaimed::Cleared {
            previous_holder,
            cleared_queue,
        } = &outcome
        {
            self.revoke_all_approved(&device, actor, "device reclaimed")
                .await?;
            self.save_state(device_id, &state, record.updated_at).await?;
            self.clear_device_access(&device).await?;

            if let Some(previous) = previous_holder {
                UsageHistoryRepo::close_open(
                    self.pool(),
                    device_id,
                    previous,
                    now,
                    held_minutes as i32,
                )
                .await?;
                self.events().publish(
                    DeviceEvent::new(kinds::DEVICE_RECLAIMED, device.id, &device.name)
                        .notify(previous)
                        .with_message(format!("Your hold on {} was cleared", device.name)),
                );
            }
            for queued in cleared_queue {
                self.events().publish(
                    DeviceEvent::new(kinds::DEVICE_RECLAIMED, device.id, &device.name)
                        .notify(queued)
                        .with_message(format!("The wait queue for {} was cleared", device.name)),
                );
            }
        }

        Ok(Some(outcome))
    }

    /// Rotate every device held past its configured occupancy limit to
    /// the next queued holder. Devices with an empty queue are left
    /// alone regardless of elapsed time.
    ///
    /// Returns the number of devices rotated.
    pub async fn rotate_overdue(&self) -> AppResult<usize> {
        let devices = DeviceRepo::list_with_occupancy_limit(self.pool()).await?;
        let mut rotated = 0;

        for device in devices {
            let Some(max_minutes) = device.max_occupancy_minutes else {
                continue;
            };
            match self.rotate_device(&device, max_minutes).await {
                Ok(true) => rotated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        device_id = device.id,
                        error = %e,
                        "Occupancy rotation failed for device; continuing"
                    );
                }
            }
        }

        Ok(rotated)
    }

    async fn rotate_device(&self, device: &Device, max_minutes: i32) -> AppResult<bool> {
        let _guard = self.lock(device.id).await;
        let Some(record) = UsageRepo::find_by_device(self.pool(), device.id).await? else {
            return Ok(false);
        };
        let mut state = record.to_state()?;
        let now = Utc::now();

        if !reclamation::should_rotate(&state, max_minutes, now) {
            return Ok(false);
        }

        let held_minutes = state.occupied_minutes(now);
        let released = state.release(now)?;

        self.revoke_all_approved(device, SYSTEM_ACTOR, "occupancy limit reached")
            .await?;
        self.save_state(device.id, &state, record.updated_at).await?;

        UsageHistoryRepo::close_open(
            self.pool(),
            device.id,
            &released.previous_holder,
            now,
            held_minutes as i32,
        )
        .await?;
        self.clear_access(device, &released.previous_holder).await?;

        self.events().publish(
            DeviceEvent::new(kinds::DEVICE_RECLAIMED, device.id, &device.name)
                .notify(&released.previous_holder)
                .with_message(format!(
                    "{} exceeded its {max_minutes}-minute occupancy limit and was reassigned",
                    device.name
                )),
        );

        // should_rotate guarantees a queue, so release promoted someone.
        if let Some(next) = &released.next_holder {
            UsageHistoryRepo::open(
                self.pool(),
                &OpenUsageHistory {
                    device_id: device.id,
                    holder: next.clone(),
                    start_time: now,
                    purpose: None,
                },
            )
            .await?;
            self.grant_occupant(device, next).await?;

            self.events().publish(
                DeviceEvent::new(kinds::DEVICE_REASSIGNED, device.id, &device.name)
                    .notify(next)
                    .with_message(format!("{} has been rotated to you", device.name)),
            );
        }

        tracing::info!(
            device_id = device.id,
            previous = %released.previous_holder,
            next = released.next_holder.as_deref().unwrap_or("-"),
            "Rotated device past its occupancy limit"
        );
        Ok(true)
    }
}
