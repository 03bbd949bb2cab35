//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod access_repo;
pub mod device_repo;
pub mod history_repo;
pub mod settings_repo;
pub mod share_repo;
pub mod usage_repo;

pub use access_repo::AccessEntryRepo;
pub use device_repo::DeviceRepo;
pub use history_repo::UsageHistoryRepo;
pub use settings_repo::SettingsRepo;
pub use share_repo::ShareRequestRepo;
pub use usage_repo::UsageRepo;
