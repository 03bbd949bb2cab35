//! The per-device usage state machine.
//!
//! [`UsageState`] is the in-memory image of one `device_usage` row. Every
//! engine operation follows the same shape: load the row, apply one of
//! the transition methods below, persist the result. The methods reject
//! any transition not explicitly allowed, so an out-of-order request can
//! never corrupt a record.
//!
//! Invariants maintained by every method:
//! - `holder` is set iff `status` is `Occupied` or `LongTermOccupied`;
//! - `queue` never contains duplicates (case-insensitive) and never
//!   contains the current holder.

use crate::error::CoreError;
use crate::identity;
use crate::queue;
use crate::status::DeviceStatus;
use crate::types::Timestamp;

/// Expected occupation length used when a queued user is promoted
/// without having stated one.
pub const DEFAULT_EXPECTED_MINUTES: i32 = 60;

/// In-memory image of a device's usage record.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageState {
    pub status: DeviceStatus,
    pub holder: Option<String>,
    pub start_time: Option<Timestamp>,
    pub expected_minutes: i32,
    pub is_long_term: bool,
    pub long_term_end: Option<Timestamp>,
    pub long_term_purpose: Option<String>,
    pub queue: Vec<String>,
}

impl Default for UsageState {
    fn default() -> Self {
        Self {
            status: DeviceStatus::Available,
            holder: None,
            start_time: None,
            expected_minutes: 0,
            is_long_term: false,
            long_term_end: None,
            long_term_purpose: None,
            queue: Vec::new(),
        }
    }
}

/// Outcome of a release or rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Released {
    pub previous_holder: String,
    /// Queue head promoted to holder, if anyone was waiting.
    pub next_holder: Option<String>,
}

/// Outcome of a preemption.
#[derive(Debug, Clone, PartialEq)]
pub struct Preempted {
    /// The holder pushed to the head of the queue. `None` when the
    /// device was available and preemption degraded to a plain `use`.
    pub displaced: Option<String>,
}

/// Outcome of a reclamation attempt on one device.
#[derive(Debug, Clone, PartialEq)]
pub enum Reclaimed {
    /// Unexpired long-term hold, left alone (non-forced cleanup only).
    Skipped,
    /// Record reset to available; carries whoever lost out, for
    /// notification purposes.
    Cleared {
        previous_holder: Option<String>,
        cleared_queue: Vec<String>,
    },
}

impl UsageState {
    /// Occupy an available device.
    pub fn occupy(
        &mut self,
        holder: &str,
        expected_minutes: i32,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        match self.status {
            DeviceStatus::Available => {
                self.status = DeviceStatus::Occupied;
                self.holder = Some(holder.to_string());
                self.start_time = Some(now);
                self.expected_minutes = expected_minutes;
                self.clear_long_term();
                queue::remove(&mut self.queue, holder);
                Ok(())
            }
            other => Err(CoreError::InvalidState {
                operation: "use",
                status: other.as_str(),
            }),
        }
    }

    /// Occupy an available device for a long-term hold ending at `end`.
    pub fn occupy_long_term(
        &mut self,
        holder: &str,
        end: Timestamp,
        purpose: Option<String>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if self.status != DeviceStatus::Available {
            return Err(CoreError::InvalidState {
                operation: "long-term use",
                status: self.status.as_str(),
            });
        }
        if end <= now {
            return Err(CoreError::Validation(
                "Long-term end date must be in the future".to_string(),
            ));
        }

        self.status = DeviceStatus::LongTermOccupied;
        self.holder = Some(holder.to_string());
        self.start_time = Some(now);
        self.expected_minutes = 0;
        self.is_long_term = true;
        self.long_term_end = Some(end);
        self.long_term_purpose = purpose;
        queue::remove(&mut self.queue, holder);
        Ok(())
    }

    /// End the current hold. The queue head (if any) becomes the new
    /// holder; otherwise the device goes back to available.
    ///
    /// Authorization (holder-or-elevated) is the caller's concern, as is
    /// revoking approved shares before the holder changes.
    pub fn release(&mut self, now: Timestamp) -> Result<Released, CoreError> {
        if !self.status.is_occupied() {
            return Err(CoreError::InvalidState {
                operation: "release",
                status: self.status.as_str(),
            });
        }
        let previous_holder = self.take_holder()?;
        self.clear_long_term();

        if self.queue.is_empty() {
            self.reset_available();
            Ok(Released {
                previous_holder,
                next_holder: None,
            })
        } else {
            let next = self.queue.remove(0);
            self.status = DeviceStatus::Occupied;
            self.holder = Some(next.clone());
            self.start_time = Some(now);
            self.expected_minutes = DEFAULT_EXPECTED_MINUTES;
            Ok(Released {
                previous_holder,
                next_holder: Some(next),
            })
        }
    }

    /// Forcibly take the device from its current holder, who moves to
    /// the head of the queue. Falls back to a plain occupation when the
    /// device is available.
    pub fn preempt(
        &mut self,
        taker: &str,
        expected_minutes: i32,
        now: Timestamp,
    ) -> Result<Preempted, CoreError> {
        if let Some(holder) = &self.holder {
            if identity::eq(holder, taker) {
                return Err(CoreError::AlreadyHolder {
                    identity: taker.to_string(),
                });
            }
        }

        match self.status {
            DeviceStatus::Available => {
                self.occupy(taker, expected_minutes, now)?;
                Ok(Preempted { displaced: None })
            }
            DeviceStatus::Occupied => {
                let displaced = self.take_holder()?;
                queue::remove(&mut self.queue, taker);
                queue::push_front_unique(&mut self.queue, &displaced);
                self.holder = Some(taker.to_string());
                self.start_time = Some(now);
                self.expected_minutes = expected_minutes;
                self.clear_long_term();
                Ok(Preempted {
                    displaced: Some(displaced),
                })
            }
            other => Err(CoreError::InvalidState {
                operation: "preempt",
                status: other.as_str(),
            }),
        }
    }

    /// Join the wait queue at the tail. Returns the 1-based position.
    pub fn enqueue(&mut self, id: &str, supports_queue: bool) -> Result<usize, CoreError> {
        self.ensure_queueable("queue", id, supports_queue)?;
        if queue::position(&self.queue, id).is_some() {
            return Err(CoreError::AlreadyQueued {
                identity: id.to_string(),
            });
        }
        queue::push_back_unique(&mut self.queue, id);
        Ok(self.queue.len())
    }

    /// Join the wait queue at the head (elevated actors only; the caller
    /// enforces authorization). Returns the 1-based position, always 1.
    pub fn enqueue_priority(&mut self, id: &str, supports_queue: bool) -> Result<usize, CoreError> {
        self.ensure_queueable("queue", id, supports_queue)?;
        if queue::position(&self.queue, id).is_some() {
            return Err(CoreError::AlreadyQueued {
                identity: id.to_string(),
            });
        }
        queue::push_front_unique(&mut self.queue, id);
        Ok(1)
    }

    /// Leave the wait queue.
    pub fn cancel_queue(&mut self, id: &str) -> Result<(), CoreError> {
        if queue::remove(&mut self.queue, id) {
            Ok(())
        } else {
            Err(CoreError::NotQueued {
                identity: id.to_string(),
            })
        }
    }

    /// Clear the record back to available unless it is an unexpired
    /// long-term hold and `force` is not set.
    pub fn reclaim(&mut self, force: bool, now: Timestamp) -> Reclaimed {
        if !force && self.is_long_term {
            if let Some(end) = self.long_term_end {
                if end > now {
                    return Reclaimed::Skipped;
                }
            }
        }

        let previous_holder = self.holder.take();
        let cleared_queue = std::mem::take(&mut self.queue);
        self.reset_available();
        Reclaimed::Cleared {
            previous_holder,
            cleared_queue,
        }
    }

    /// Minutes the device has been held, rounded up, minimum 1 once a
    /// holder exists (so a fresh acquisition never reads "0 minutes").
    pub fn occupied_minutes(&self, now: Timestamp) -> i64 {
        match (&self.holder, self.start_time) {
            (Some(_), Some(start)) => {
                let secs = (now - start).num_seconds().max(0);
                (secs as u64).div_ceil(60).max(1) as i64
            }
            _ => 0,
        }
    }

    fn ensure_queueable(
        &self,
        operation: &'static str,
        id: &str,
        supports_queue: bool,
    ) -> Result<(), CoreError> {
        if !self.status.is_occupied() {
            return Err(CoreError::InvalidState {
                operation,
                status: self.status.as_str(),
            });
        }
        if !supports_queue {
            return Err(CoreError::Validation(
                "Device does not support queueing".to_string(),
            ));
        }
        if let Some(holder) = &self.holder {
            if identity::eq(holder, id) {
                return Err(CoreError::AlreadyHolder {
                    identity: id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn take_holder(&mut self) -> Result<String, CoreError> {
        self.holder.take().ok_or_else(|| {
            CoreError::Validation("Occupied record has no holder".to_string())
        })
    }

    fn clear_long_term(&mut self) {
        self.is_long_term = false;
        self.long_term_end = None;
        self.long_term_purpose = None;
    }

    fn reset_available(&mut self) {
        self.status = DeviceStatus::Available;
        self.holder = None;
        self.start_time = None;
        self.expected_minutes = 0;
        self.clear_long_term();
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn now() -> Timestamp {
        Utc::now()
    }

    /// The invariants from the data model, checked after every step of
    /// the scenario tests.
    fn assert_invariants(state: &UsageState) {
        // Holder set iff occupied.
        assert_eq!(state.holder.is_some(), state.status.is_occupied());
        // No duplicates in the queue.
        for (i, a) in state.queue.iter().enumerate() {
            for b in &state.queue[i + 1..] {
                assert!(!identity::eq(a, b), "duplicate queue entry {a}");
            }
        }
        // Queue never contains the holder.
        if let Some(holder) = &state.holder {
            assert!(queue::position(&state.queue, holder).is_none());
        }
    }

    #[test]
    fn use_from_available_occupies() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 30, now()).unwrap();
        assert_eq!(state.status, DeviceStatus::Occupied);
        assert_eq!(state.holder.as_deref(), Some("a11111111"));
        assert!(state.start_time.is_some());
        assert_eq!(state.expected_minutes, 30);
        assert_invariants(&state);
    }

    #[test]
    fn use_while_occupied_is_rejected() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        assert_matches!(
            state.occupy("b22222222", 60, now()),
            Err(CoreError::InvalidState { operation: "use", .. })
        );
    }

    #[test]
    fn long_term_use_requires_future_end() {
        let mut state = UsageState::default();
        let past = now() - Duration::hours(1);
        assert_matches!(
            state.occupy_long_term("a11111111", past, None, now()),
            Err(CoreError::Validation(_))
        );
        assert_eq!(state.status, DeviceStatus::Available);
    }

    #[test]
    fn long_term_use_sets_end_and_purpose() {
        let mut state = UsageState::default();
        let end = now() + Duration::days(7);
        state
            .occupy_long_term("a11111111", end, Some("soak test".into()), now())
            .unwrap();
        assert_eq!(state.status, DeviceStatus::LongTermOccupied);
        assert!(state.is_long_term);
        assert_eq!(state.long_term_end, Some(end));
        assert_eq!(state.long_term_purpose.as_deref(), Some("soak test"));
        assert_invariants(&state);
    }

    #[test]
    fn release_with_empty_queue_goes_available() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        let released = state.release(now()).unwrap();
        assert_eq!(released.previous_holder, "a11111111");
        assert_eq!(released.next_holder, None);
        assert_eq!(state.status, DeviceStatus::Available);
        assert_eq!(state.holder, None);
        assert_eq!(state.start_time, None);
        assert_invariants(&state);
    }

    #[test]
    fn release_promotes_queue_head() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        state.enqueue("b22222222", true).unwrap();
        state.enqueue("c33333333", true).unwrap();

        let released = state.release(now()).unwrap();
        assert_eq!(released.next_holder.as_deref(), Some("b22222222"));
        assert_eq!(state.status, DeviceStatus::Occupied);
        assert_eq!(state.holder.as_deref(), Some("b22222222"));
        assert_eq!(state.queue, vec!["c33333333".to_string()]);
        assert_eq!(state.expected_minutes, DEFAULT_EXPECTED_MINUTES);
        assert_invariants(&state);
    }

    #[test]
    fn release_from_long_term_clears_long_term_fields() {
        let mut state = UsageState::default();
        state
            .occupy_long_term("a11111111", now() + Duration::days(1), None, now())
            .unwrap();
        state.enqueue("b22222222", true).unwrap();

        state.release(now()).unwrap();
        assert_eq!(state.status, DeviceStatus::Occupied);
        assert!(!state.is_long_term);
        assert_eq!(state.long_term_end, None);
        assert_invariants(&state);
    }

    #[test]
    fn release_while_available_is_rejected() {
        let mut state = UsageState::default();
        assert_matches!(
            state.release(now()),
            Err(CoreError::InvalidState { operation: "release", .. })
        );
    }

    #[test]
    fn preempt_displaces_holder_to_queue_head() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        state.enqueue("b22222222", true).unwrap();

        let preempted = state.preempt("c33333333", 60, now()).unwrap();
        assert_eq!(preempted.displaced.as_deref(), Some("a11111111"));
        assert_eq!(state.holder.as_deref(), Some("c33333333"));
        assert_eq!(
            state.queue,
            vec!["a11111111".to_string(), "b22222222".to_string()]
        );
        assert_invariants(&state);
    }

    #[test]
    fn preempt_by_current_holder_is_rejected() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        assert_matches!(
            state.preempt("A11111111", 60, now()),
            Err(CoreError::AlreadyHolder { .. })
        );
    }

    #[test]
    fn preempt_available_device_degrades_to_use() {
        let mut state = UsageState::default();
        let preempted = state.preempt("a11111111", 45, now()).unwrap();
        assert_eq!(preempted.displaced, None);
        assert_eq!(state.status, DeviceStatus::Occupied);
        assert_eq!(state.holder.as_deref(), Some("a11111111"));
        assert_invariants(&state);
    }

    #[test]
    fn preempt_long_term_hold_is_rejected() {
        let mut state = UsageState::default();
        state
            .occupy_long_term("a11111111", now() + Duration::days(1), None, now())
            .unwrap();
        assert_matches!(
            state.preempt("b22222222", 60, now()),
            Err(CoreError::InvalidState { operation: "preempt", .. })
        );
    }

    #[test]
    fn preempting_from_within_the_queue_leaves_no_duplicate() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        state.enqueue("b22222222", true).unwrap();

        // b was queued, then preempts: must not appear in the queue anymore.
        state.preempt("b22222222", 60, now()).unwrap();
        assert_eq!(state.holder.as_deref(), Some("b22222222"));
        assert_eq!(state.queue, vec!["a11111111".to_string()]);
        assert_invariants(&state);
    }

    #[test]
    fn enqueue_requires_occupied_device() {
        let mut state = UsageState::default();
        assert_matches!(
            state.enqueue("a11111111", true),
            Err(CoreError::InvalidState { .. })
        );
    }

    #[test]
    fn enqueue_requires_queue_support() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        assert_matches!(
            state.enqueue("b22222222", false),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn enqueue_rejects_holder_and_duplicates() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        assert_matches!(
            state.enqueue("a11111111", true),
            Err(CoreError::AlreadyHolder { .. })
        );

        assert_eq!(state.enqueue("b22222222", true).unwrap(), 1);
        assert_matches!(
            state.enqueue("B22222222", true),
            Err(CoreError::AlreadyQueued { .. })
        );
        assert_invariants(&state);
    }

    #[test]
    fn enqueue_reports_one_based_position() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        assert_eq!(state.enqueue("b22222222", true).unwrap(), 1);
        assert_eq!(state.enqueue("c33333333", true).unwrap(), 2);
    }

    #[test]
    fn priority_enqueue_inserts_at_head() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        state.enqueue("b22222222", true).unwrap();
        assert_eq!(state.enqueue_priority("c33333333", true).unwrap(), 1);
        assert_eq!(
            state.queue,
            vec!["c33333333".to_string(), "b22222222".to_string()]
        );
        assert_invariants(&state);
    }

    #[test]
    fn cancel_queue_removes_or_fails() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        state.enqueue("b22222222", true).unwrap();

        state.cancel_queue("b22222222").unwrap();
        assert!(state.queue.is_empty());
        assert_matches!(
            state.cancel_queue("b22222222"),
            Err(CoreError::NotQueued { .. })
        );
    }

    #[test]
    fn reclaim_skips_unexpired_long_term_without_force() {
        let mut state = UsageState::default();
        state
            .occupy_long_term("a11111111", now() + Duration::days(1), None, now())
            .unwrap();
        assert_eq!(state.reclaim(false, now()), Reclaimed::Skipped);
        assert_eq!(state.status, DeviceStatus::LongTermOccupied);
    }

    #[test]
    fn reclaim_clears_expired_long_term() {
        let mut state = UsageState::default();
        state
            .occupy_long_term("a11111111", now() + Duration::seconds(1), None, now())
            .unwrap();
        let later = now() + Duration::hours(1);
        assert_matches!(
            state.reclaim(false, later),
            Reclaimed::Cleared { ref previous_holder, .. }
                if previous_holder.as_deref() == Some("a11111111")
        );
        assert_eq!(state.status, DeviceStatus::Available);
    }

    #[test]
    fn forced_reclaim_clears_unexpired_long_term() {
        let mut state = UsageState::default();
        state
            .occupy_long_term("a11111111", now() + Duration::days(30), None, now())
            .unwrap();
        assert_matches!(state.reclaim(true, now()), Reclaimed::Cleared { .. });
        assert_eq!(state.status, DeviceStatus::Available);
        assert_eq!(state.holder, None);
    }

    #[test]
    fn reclaim_reports_cleared_queue_for_notification() {
        let mut state = UsageState::default();
        state.occupy("a11111111", 60, now()).unwrap();
        state.enqueue("b22222222", true).unwrap();
        state.enqueue("c33333333", true).unwrap();

        match state.reclaim(false, now()) {
            Reclaimed::Cleared {
                previous_holder,
                cleared_queue,
            } => {
                assert_eq!(previous_holder.as_deref(), Some("a11111111"));
                assert_eq!(cleared_queue.len(), 2);
            }
            Reclaimed::Skipped => panic!("expected cleared"),
        }
        assert!(state.queue.is_empty());
    }

    #[test]
    fn occupied_minutes_is_zero_when_idle() {
        let state = UsageState::default();
        assert_eq!(state.occupied_minutes(now()), 0);
    }

    #[test]
    fn occupied_minutes_reads_one_immediately_after_acquisition() {
        let mut state = UsageState::default();
        let t = now();
        state.occupy("a11111111", 60, t).unwrap();
        assert_eq!(state.occupied_minutes(t), 1);
    }

    #[test]
    fn occupied_minutes_rounds_up() {
        let mut state = UsageState::default();
        let t = now();
        state.occupy("a11111111", 60, t).unwrap();
        assert_eq!(state.occupied_minutes(t + Duration::seconds(61)), 2);
        assert_eq!(state.occupied_minutes(t + Duration::minutes(90)), 90);
    }

    /// The end-to-end scenario from the acceptance checklist:
    /// use(A), enqueue(B), preempt(C), then three releases drain the
    /// queue in order and the device ends up available.
    #[test]
    fn full_lifecycle_scenario() {
        let mut state = UsageState::default();

        state.occupy("a11111111", 60, now()).unwrap();
        assert_eq!(state.holder.as_deref(), Some("a11111111"));
        assert_invariants(&state);

        state.enqueue("b22222222", true).unwrap();
        assert_eq!(state.queue, vec!["b22222222".to_string()]);
        assert_invariants(&state);

        state.preempt("c33333333", 60, now()).unwrap();
        assert_eq!(state.holder.as_deref(), Some("c33333333"));
        assert_eq!(
            state.queue,
            vec!["a11111111".to_string(), "b22222222".to_string()]
        );
        assert_invariants(&state);

        let r = state.release(now()).unwrap();
        assert_eq!(r.next_holder.as_deref(), Some("a11111111"));
        assert_eq!(state.queue, vec!["b22222222".to_string()]);
        assert_invariants(&state);

        let r = state.release(now()).unwrap();
        assert_eq!(r.next_holder.as_deref(), Some("b22222222"));
        assert!(state.queue.is_empty());
        assert_invariants(&state);

        let r = state.release(now()).unwrap();
        assert_eq!(r.next_holder, None);
        assert_eq!(state.status, DeviceStatus::Available);
        assert_eq!(state.holder, None);
        assert_invariants(&state);
    }
}
