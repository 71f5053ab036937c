use std::sync::Arc;

use medwatch_pipeline::SyncOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: medwatch_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Runs sync passes on demand. Single-flight is enforced by the database,
    /// so concurrent requests may share this freely.
    pub orchestrator: SyncOrchestrator,
}
