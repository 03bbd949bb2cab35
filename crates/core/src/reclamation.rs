//! Reclamation eligibility rules.
//!
//! The scheduler decides *when* to act; these functions decide *whether*
//! a given record is eligible. Both are deliberately separate from the
//! transitions in [`crate::usage`] so the rules can be tested without a
//! running loop.

use crate::status::DeviceStatus;
use crate::types::Timestamp;
use crate::usage::UsageState;

/// Whether the occupancy-limit enforcement should rotate this device to
/// the next queued holder.
///
/// Rotation requires all of:
/// - a current holder on a plain (not long-term) occupation;
/// - a non-empty queue — a device is never force-emptied to available
///   solely for exceeding its limit;
/// - elapsed time at or past the configured limit.
pub fn should_rotate(state: &UsageState, max_minutes: i32, now: Timestamp) -> bool {
    if state.status != DeviceStatus::Occupied || state.is_long_term {
        return false;
    }
    if state.queue.is_empty() {
        return false;
    }
    let Some(start) = state.start_time else {
        return false;
    };
    if max_minutes <= 0 {
        return false;
    }
    (now - start).num_minutes() >= i64::from(max_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn occupied_for(minutes: i64, queue: &[&str]) -> (UsageState, Timestamp) {
        let now = Utc::now();
        let mut state = UsageState::default();
        state
            .occupy("a11111111", 60, now - Duration::minutes(minutes))
            .unwrap();
        for q in queue {
            state.enqueue(q, true).unwrap();
        }
        (state, now)
    }

    #[test]
    fn rotates_past_limit_with_waiters() {
        let (state, now) = occupied_for(120, &["b22222222"]);
        assert!(should_rotate(&state, 90, now));
    }

    #[test]
    fn never_rotates_with_empty_queue() {
        let (state, now) = occupied_for(600, &[]);
        assert!(!should_rotate(&state, 90, now));
    }

    #[test]
    fn does_not_rotate_before_limit() {
        let (state, now) = occupied_for(30, &["b22222222"]);
        assert!(!should_rotate(&state, 90, now));
    }

    #[test]
    fn rotates_exactly_at_limit() {
        let (state, now) = occupied_for(90, &["b22222222"]);
        assert!(should_rotate(&state, 90, now));
    }

    #[test]
    fn long_term_holds_are_exempt() {
        let now = Utc::now();
        let mut state = UsageState::default();
        state
            .occupy_long_term("a11111111", now + Duration::days(7), None, now)
            .unwrap();
        state.enqueue("b22222222", true).unwrap();
        assert!(!should_rotate(&state, 1, now + Duration::days(1)));
    }

    #[test]
    fn nonpositive_limit_is_ignored() {
        let (state, now) = occupied_for(600, &["b22222222"]);
        assert!(!should_rotate(&state, 0, now));
    }
}
