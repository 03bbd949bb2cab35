//! Access registry maintenance.
//!
//! Derived bookkeeping: one entry per (device, identity) holding network
//! access, tagged occupant or shared, carrying the device address. The
//! engine rebuilds entries on every holder or share change; nothing else
//! writes them.

use labrack_db::models::access::{ROLE_OCCUPANT, ROLE_SHARED};
use labrack_db::models::device::Device;
use labrack_db::repositories::AccessEntryRepo;

use crate::engine::Engine;
use crate::error::AppResult;

impl Engine {
    /// Record the new holder's access at the device address.
    pub(crate) async fn grant_occupant(&self, device: &Device, identity: &str) -> AppResult<()> {
        AccessEntryRepo::upsert(
            self.pool(),
            device.id,
            identity,
            ROLE_OCCUPANT,
            Some(&device.ip_address),
        )
        .await?;
        Ok(())
    }

    /// Record an approved sharer's access at the device address.
    pub(crate) async fn grant_shared(&self, device: &Device, identity: &str) -> AppResult<()> {
        AccessEntryRepo::upsert(
            self.pool(),
            device.id,
            identity,
            ROLE_SHARED,
            Some(&device.ip_address),
        )
        .await?;
        Ok(())
    }

    /// Drop one identity's access entry.
    pub(crate) async fn clear_access(&self, device: &Device, identity: &str) -> AppResult<()> {
        AccessEntryRepo::delete(self.pool(), device.id, identity).await?;
        Ok(())
    }

    /// Drop every shared entry for a device (share revocation sweep).
    pub(crate) async fn clear_shared_access(&self, device: &Device) -> AppResult<()> {
        AccessEntryRepo::delete_by_role(self.pool(), device.id, ROLE_SHARED).await?;
        Ok(())
    }

    /// Drop every entry for a device (reclamation).
    pub(crate) async fn clear_device_access(&self, device: &Device) -> AppResult<()> {
        AccessEntryRepo::delete_for_device(self.pool(), device.id).await?;
        Ok(())
    }
}
