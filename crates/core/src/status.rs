//! Device occupancy status.
//!
//! Stored as text in the `device_usage` table; parsed into the closed
//! enum before any decision is made so unknown strings are rejected at
//! the boundary instead of leaking through comparisons.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Occupancy status of a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Available,
    Occupied,
    LongTermOccupied,
    Maintenance,
    Offline,
}

impl DeviceStatus {
    /// Canonical storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Available => "available",
            DeviceStatus::Occupied => "occupied",
            DeviceStatus::LongTermOccupied => "long_term_occupied",
            DeviceStatus::Maintenance => "maintenance",
            DeviceStatus::Offline => "offline",
        }
    }

    /// Parse the storage form, rejecting anything not in the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "available" => Ok(DeviceStatus::Available),
            "occupied" => Ok(DeviceStatus::Occupied),
            "long_term_occupied" => Ok(DeviceStatus::LongTermOccupied),
            "maintenance" => Ok(DeviceStatus::Maintenance),
            "offline" => Ok(DeviceStatus::Offline),
            other => Err(CoreError::Validation(format!(
                "Unknown device status '{other}'"
            ))),
        }
    }

    /// True while a holder is assigned.
    pub fn is_occupied(self) -> bool {
        matches!(self, DeviceStatus::Occupied | DeviceStatus::LongTermOccupied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_storage_form() {
        for status in [
            DeviceStatus::Available,
            DeviceStatus::Occupied,
            DeviceStatus::LongTermOccupied,
            DeviceStatus::Maintenance,
            DeviceStatus::Offline,
        ] {
            assert_eq!(DeviceStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(DeviceStatus::parse("busy").is_err());
    }

    #[test]
    fn occupied_covers_both_occupancy_kinds() {
        assert!(DeviceStatus::Occupied.is_occupied());
        assert!(DeviceStatus::LongTermOccupied.is_occupied());
        assert!(!DeviceStatus::Available.is_occupied());
        assert!(!DeviceStatus::Maintenance.is_occupied());
        assert!(!DeviceStatus::Offline.is_occupied());
    }
}
