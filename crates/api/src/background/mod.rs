//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All tasks accept a [`CancellationToken`]
//! for graceful shutdown and log per-device failures without aborting
//! the rest of their iteration.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod daily_cleanup;
pub mod occupancy;
