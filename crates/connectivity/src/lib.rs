//! Device reachability probing and caching.
//!
//! - [`Prober`] — the seam to the external probe (system `ping` in
//!   production, a fake in tests).
//! - [`ConnectivityCache`] — time-bounded verdicts with an active
//!   polling set and in-flight probe de-duplication.
//! - [`ConnectivityManager`] — owns the background loop that keeps
//!   recently-queried devices probed and persists verdicts.

pub mod cache;
pub mod manager;
pub mod probe;

pub use cache::{ConnectivityCache, ConnectivityStatus};
pub use manager::ConnectivityManager;
pub use probe::{PingProber, Prober};
