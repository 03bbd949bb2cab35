//! Row structs and create/update DTOs, one module per table family.

pub mod access;
pub mod device;
pub mod history;
pub mod settings;
pub mod share;
pub mod usage;
