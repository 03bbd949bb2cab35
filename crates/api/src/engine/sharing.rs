//! Co-occupancy (share) workflow: request, holder decision, revocation,
//! requester cancellation, the revoke-all sweep on holder changes, and
//! the visibility-loss cascade driven by the group/permission layer.

use chrono::Utc;
use labrack_core::error::CoreError;
use labrack_core::sharing::{self, ShareStatus};
use labrack_core::types::DbId;
use labrack_core::{identity, queue};
use labrack_db::models::device::Device;
use labrack_db::models::history::OpenUsageHistory;
use labrack_db::models::share::{CreateShareRequest, ShareRequest};
use labrack_db::repositories::{ShareRequestRepo, UsageHistoryRepo, UsageRepo};
use labrack_events::{kinds, DeviceEvent};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::AppResult;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A share request plus the requester's queue position, if the request
/// auto-enqueued them.
#[derive(Debug, Serialize)]
pub struct SharePayload {
    pub request: ShareRequest,
    /// 1-based queue position; `None` when the device rejects queueing.
    pub queue_position: Option<usize>,
}

/// Tally of a visibility-loss cascade.
#[derive(Debug, Default, Serialize)]
pub struct VisibilityCascade {
    pub cancelled_requests: usize,
    pub revoked_shares: usize,
    pub removed_from_queue: usize,
    /// Set when the current holder lost visibility and the device was
    /// released on their behalf.
    pub released_holder: Option<String>,
    pub new_holder: Option<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Engine {
    /// Open a share request against an occupied device. As a
    /// convenience the requester also joins the wait queue when the
    /// device supports it (idempotent).
    pub async fn request_share(
        &self,
        device_id: DbId,
        requester: &str,
        message: Option<String>,
    ) -> AppResult<SharePayload> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let record = UsageRepo::find_or_create(self.pool(), device_id).await?;
        let mut state = record.to_state()?;

        if !state.status.is_occupied() {
            return Err(CoreError::InvalidState {
                operation: "request share",
                status: state.status.as_str(),
            }
            .into());
        }
        if let Some(holder) = &state.holder {
            if identity::eq(holder, requester) {
                return Err(CoreError::AlreadyHolder {
                    identity: requester.to_string(),
                }
                .into());
            }
        }
        if ShareRequestRepo::find_active(self.pool(), device_id, requester)
            .await?
            .is_some()
        {
            return Err(CoreError::AlreadyRequested {
                identity: requester.to_string(),
            }
            .into());
        }

        let request = ShareRequestRepo::create(
            self.pool(),
            &CreateShareRequest {
                device_id,
                requester: requester.to_string(),
                message,
            },
        )
        .await?;

        let queue_position = if device.support_queue {
            match state.enqueue(requester, true) {
                Ok(position) => {
                    self.save_state(device_id, &state, record.updated_at).await?;
                    Some(position)
                }
                // Already waiting; report the existing slot.
                Err(CoreError::AlreadyQueued { .. }) => {
                    queue::position(&state.queue, requester).map(|p| p + 1)
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        if let Some(holder) = &state.holder {
            self.events().publish(
                DeviceEvent::new(kinds::SHARE_REQUESTED, device.id, &device.name)
                    .notify(holder)
                    .with_message(format!(
                        "{requester} asked to share {} with you",
                        device.name
                    )),
            );
        }

        Ok(SharePayload {
            request,
            queue_position,
        })
    }

    /// Holder decision on a pending request. Approval registers shared
    /// access at the device address.
    pub async fn decide_share(
        &self,
        request_id: DbId,
        actor: &str,
        approve: bool,
        reason: Option<String>,
    ) -> AppResult<ShareRequest> {
        let request = self.share_request(request_id).await?;
        let _guard = self.lock(request.device_id).await;
        let device = self.device(request.device_id).await?;
        let record = self.usage_record(request.device_id).await?;
        let state = record.to_state()?;

        let holder_matches = state
            .holder
            .as_ref()
            .is_some_and(|holder| identity::eq(holder, actor));
        if !holder_matches {
            return Err(CoreError::PermissionDenied(
                "Only the current holder may decide share requests".to_string(),
            )
            .into());
        }

        sharing::validate_decision(request.share_status()?)?;
        let target = if approve {
            ShareStatus::Approved
        } else {
            ShareStatus::Rejected
        };

        let updated = ShareRequestRepo::transition(
            self.pool(),
            request_id,
            ShareStatus::Pending.as_str(),
            target.as_str(),
            actor,
            reason.as_deref(),
        )
        .await?
        .ok_or(CoreError::AlreadyDecided)?;

        if approve {
            self.grant_shared(&device, &request.requester).await?;
        }

        let (kind, verdict) = if approve {
            (kinds::SHARE_APPROVED, "approved")
        } else {
            (kinds::SHARE_REJECTED, "rejected")
        };
        self.events().publish(
            DeviceEvent::new(kind, device.id, &device.name)
                .notify(&request.requester)
                .with_message(format!(
                    "Your share request for {} was {verdict} by {actor}",
                    device.name
                )),
        );

        Ok(updated)
    }

    /// Revoke an approved share. Holder or elevated actors only. The
    /// requester keeps their queue slot.
    pub async fn revoke_share(
        &self,
        request_id: DbId,
        actor: &str,
        elevated: bool,
        reason: Option<String>,
    ) -> AppResult<ShareRequest> {
        let request = self.share_request(request_id).await?;
        let _guard = self.lock(request.device_id).await;
        let device = self.device(request.device_id).await?;
        let record = self.usage_record(request.device_id).await?;
        let state = record.to_state()?;

        let holder_matches = state
            .holder
            .as_ref()
            .is_some_and(|holder| identity::eq(holder, actor));
        if !holder_matches && !elevated {
            return Err(CoreError::PermissionDenied(
                "Only the current holder or an admin may revoke a share".to_string(),
            )
            .into());
        }

        sharing::validate_revoke(request.share_status()?)?;
        let updated = ShareRequestRepo::transition(
            self.pool(),
            request_id,
            ShareStatus::Approved.as_str(),
            ShareStatus::Revoked.as_str(),
            actor,
            reason.as_deref(),
        )
        .await?
        .ok_or(CoreError::AlreadyDecided)?;

        self.clear_access(&device, &request.requester).await?;

        self.events().publish(
            DeviceEvent::new(kinds::SHARE_REVOKED, device.id, &device.name)
                .notify(&request.requester)
                .with_message(format!("Your shared access to {} was revoked", device.name)),
        );

        Ok(updated)
    }

    /// Requester-initiated cancellation: a pending request is cancelled,
    /// an approved one is revoked with the same side effects.
    pub async fn cancel_share(&self, request_id: DbId, actor: &str) -> AppResult<ShareRequest> {
        let request = self.share_request(request_id).await?;
        if !identity::eq(&request.requester, actor) {
            return Err(CoreError::PermissionDenied(
                "Only the requester may cancel their share request".to_string(),
            )
            .into());
        }

        let _guard = self.lock(request.device_id).await;
        let device = self.device(request.device_id).await?;

        let current = request.share_status()?;
        let target = sharing::cancellation_target(current)?;
        let updated = ShareRequestRepo::transition(
            self.pool(),
            request_id,
            current.as_str(),
            target.as_str(),
            actor,
            Some("cancelled by requester"),
        )
        .await?
        .ok_or(CoreError::AlreadyDecided)?;

        if current == ShareStatus::Approved {
            self.clear_access(&device, &request.requester).await?;
        }

        self.events().publish(
            DeviceEvent::new(kinds::SHARE_CANCELLED, device.id, &device.name).with_message(
                format!("{actor} withdrew their share request for {}", device.name),
            ),
        );

        Ok(updated)
    }

    /// All share requests for a device, newest first.
    pub async fn list_shares(&self, device_id: DbId) -> AppResult<Vec<ShareRequest>> {
        self.device(device_id).await?;
        Ok(ShareRequestRepo::list_for_device(self.pool(), device_id).await?)
    }

    /// Revoke every approved share for a device. Called (under the
    /// device lock) whenever the holder changes: release, preemption,
    /// rotation, reclamation.
    pub(crate) async fn revoke_all_approved(
        &self,
        device: &Device,
        actor: &str,
        reason: &str,
    ) -> AppResult<Vec<ShareRequest>> {
        let revoked =
            ShareRequestRepo::revoke_all_approved(self.pool(), device.id, actor, reason).await?;
        if revoked.is_empty() {
            return Ok(revoked);
        }

        self.clear_shared_access(device).await?;
        for request in &revoked {
            self.events().publish(
                DeviceEvent::new(kinds::SHARE_REVOKED, device.id, &device.name)
                    .notify(&request.requester)
                    .with_message(format!(
                        "Your shared access to {} ended: {reason}",
                        device.name
                    )),
            );
        }
        Ok(revoked)
    }

    /// Cascade for identities that lost visibility into a device:
    /// active share requests are cancelled/revoked, queue slots are
    /// removed, and if the current holder is among them the device is
    /// released on their behalf.
    pub async fn visibility_loss(
        &self,
        device_id: DbId,
        identities: &[String],
        actor: &str,
    ) -> AppResult<VisibilityCascade> {
        let _guard = self.lock(device_id).await;
        let device = self.device(device_id).await?;
        let mut cascade = VisibilityCascade::default();

        let Some(record) = UsageRepo::find_by_device(self.pool(), device_id).await? else {
            return Ok(cascade);
        };
        let mut state = record.to_state()?;
        let before = state.clone();
        let now = Utc::now();

        let lost = |candidate: &str| identities.iter().any(|id| identity::eq(id, candidate));

        // Active requests from the affected identities die first.
        let active = ShareRequestRepo::list_active_for_device(self.pool(), device_id).await?;
        for request in active.iter().filter(|r| lost(&r.requester)) {
            match request.share_status()? {
                ShareStatus::Pending => {
                    ShareRequestRepo::transition(
                        self.pool(),
                        request.id,
                        ShareStatus::Pending.as_str(),
                        ShareStatus::Cancelled.as_str(),
                        actor,
                        Some("visibility lost"),
                    )
                    .await?;
                    cascade.cancelled_requests += 1;
                }
                ShareStatus::Approved => {
                    ShareRequestRepo::transition(
                        self.pool(),
                        request.id,
                        ShareStatus::Approved.as_str(),
                        ShareStatus::Revoked.as_str(),
                        actor,
                        Some("visibility lost"),
                    )
                    .await?;
                    self.clear_access(&device, &request.requester).await?;
                    cascade.revoked_shares += 1;
                }
                _ => {}
            }
        }

        // Queue slots go next.
        for id in identities {
            if queue::remove(&mut state.queue, id) {
                cascade.removed_from_queue += 1;
            }
        }

        // Finally, a holder who lost visibility is released on their
        // behalf (reassign to the queue head or back to available).
        let holder_lost = state.holder.as_deref().is_some_and(lost);
        if holder_lost {
            let held_minutes = state.occupied_minutes(now);
            let released = state.release(now)?;

            self.revoke_all_approved(&device, actor, "holder lost visibility")
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

            if let Some(next) = &released.next_holder {
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
                        .with_message(format!("{} is now yours", device.name)),
                );
            }

            cascade.released_holder = Some(released.previous_holder);
            cascade.new_holder = released.next_holder;
        } else if state != before {
            self.save_state(device_id, &state, record.updated_at).await?;
        }

        Ok(cascade)
    }

    async fn share_request(&self, request_id: DbId) -> AppResult<ShareRequest> {
        ShareRequestRepo::find_by_id(self.pool(), request_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "share request",
                    id: request_id,
                }
                .into()
            })
    }
}
