//! Share request state machine.
//!
//! A share request grants a second identity co-occupancy of a device that
//! someone else holds, subject to the holder's approval. The lifecycle is
//! a closed table: `Pending` resolves exactly once, and only an approved
//! share can later be revoked.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of a share request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
    Cancelled,
}

impl ShareStatus {
    /// Canonical storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            ShareStatus::Pending => "pending",
            ShareStatus::Approved => "approved",
            ShareStatus::Rejected => "rejected",
            ShareStatus::Revoked => "revoked",
            ShareStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the storage form, rejecting anything not in the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(ShareStatus::Pending),
            "approved" => Ok(ShareStatus::Approved),
            "rejected" => Ok(ShareStatus::Rejected),
            "revoked" => Ok(ShareStatus::Revoked),
            "cancelled" => Ok(ShareStatus::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Unknown share status '{other}'"
            ))),
        }
    }

    /// A request still occupying its requester's "one active request per
    /// device" slot.
    pub fn is_active(self) -> bool {
        matches!(self, ShareStatus::Pending | ShareStatus::Approved)
    }
}

/// Valid target states reachable from `from`.
///
/// Terminal states (`Rejected`, `Revoked`, `Cancelled`) return an empty
/// slice; no further transitions are allowed.
pub fn valid_transitions(from: ShareStatus) -> &'static [ShareStatus] {
    match from {
        ShareStatus::Pending => &[
            ShareStatus::Approved,
            ShareStatus::Rejected,
            ShareStatus::Cancelled,
        ],
        ShareStatus::Approved => &[ShareStatus::Revoked],
        ShareStatus::Rejected | ShareStatus::Revoked | ShareStatus::Cancelled => &[],
    }
}

/// Check whether a transition is in the table.
pub fn can_transition(from: ShareStatus, to: ShareStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a holder decision (approve/reject) against the current state.
///
/// A second decision attempt on the same request fails `AlreadyDecided`.
pub fn validate_decision(current: ShareStatus) -> Result<(), CoreError> {
    match current {
        ShareStatus::Pending => Ok(()),
        _ => Err(CoreError::AlreadyDecided),
    }
}

/// Validate a revocation against the current state.
pub fn validate_revoke(current: ShareStatus) -> Result<(), CoreError> {
    if current == ShareStatus::Approved {
        Ok(())
    } else {
        Err(CoreError::InvalidState {
            operation: "revoke share",
            status: current.as_str(),
        })
    }
}

/// Resolve a requester-initiated cancellation: a pending request is
/// cancelled, an approved one is revoked (same side effects as a
/// holder revocation).
pub fn cancellation_target(current: ShareStatus) -> Result<ShareStatus, CoreError> {
    match current {
        ShareStatus::Pending => Ok(ShareStatus::Cancelled),
        ShareStatus::Approved => Ok(ShareStatus::Revoked),
        _ => Err(CoreError::AlreadyDecided),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pending_resolves_three_ways() {
        assert!(can_transition(ShareStatus::Pending, ShareStatus::Approved));
        assert!(can_transition(ShareStatus::Pending, ShareStatus::Rejected));
        assert!(can_transition(ShareStatus::Pending, ShareStatus::Cancelled));
        assert!(!can_transition(ShareStatus::Pending, ShareStatus::Revoked));
    }

    #[test]
    fn only_approved_can_be_revoked() {
        assert!(can_transition(ShareStatus::Approved, ShareStatus::Revoked));
        assert!(!can_transition(ShareStatus::Approved, ShareStatus::Rejected));
        assert!(valid_transitions(ShareStatus::Rejected).is_empty());
        assert!(valid_transitions(ShareStatus::Revoked).is_empty());
        assert!(valid_transitions(ShareStatus::Cancelled).is_empty());
    }

    #[test]
    fn second_decision_fails_already_decided() {
        assert!(validate_decision(ShareStatus::Pending).is_ok());
        assert_matches!(
            validate_decision(ShareStatus::Approved),
            Err(CoreError::AlreadyDecided)
        );
        assert_matches!(
            validate_decision(ShareStatus::Rejected),
            Err(CoreError::AlreadyDecided)
        );
    }

    #[test]
    fn revoke_requires_approved() {
        assert!(validate_revoke(ShareStatus::Approved).is_ok());
        assert_matches!(
            validate_revoke(ShareStatus::Pending),
            Err(CoreError::InvalidState { .. })
        );
    }

    #[test]
    fn cancellation_maps_pending_and_approved() {
        assert_eq!(
            cancellation_target(ShareStatus::Pending).unwrap(),
            ShareStatus::Cancelled
        );
        assert_eq!(
            cancellation_target(ShareStatus::Approved).unwrap(),
            ShareStatus::Revoked
        );
        assert_matches!(
            cancellation_target(ShareStatus::Cancelled),
            Err(CoreError::AlreadyDecided)
        );
    }

    #[test]
    fn active_states_are_pending_and_approved() {
        assert!(ShareStatus::Pending.is_active());
        assert!(ShareStatus::Approved.is_active());
        assert!(!ShareStatus::Rejected.is_active());
        assert!(!ShareStatus::Revoked.is_active());
        assert!(!ShareStatus::Cancelled.is_active());
    }

    #[test]
    fn round_trips_storage_form() {
        for status in [
            ShareStatus::Pending,
            ShareStatus::Approved,
            ShareStatus::Rejected,
            ShareStatus::Revoked,
            ShareStatus::Cancelled,
        ] {
            assert_eq!(ShareStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ShareStatus::parse("denied").is_err());
    }
}
