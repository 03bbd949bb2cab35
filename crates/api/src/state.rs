use std::sync::Arc;

use labrack_connectivity::ConnectivityManager;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::engine::Engine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`). Lifecycle
/// events are published through the engine, which owns the bus handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: labrack_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Reservation engine (state transitions, per-device locks).
    pub engine: Arc<Engine>,
    /// Connectivity cache and probe loop handle.
    pub connectivity: Arc<ConnectivityManager>,
    /// Pushes a new `(hour, minute)` to the running daily-cleanup job.
    pub cleanup_schedule: Arc<watch::Sender<(u32, u32)>>,
}
