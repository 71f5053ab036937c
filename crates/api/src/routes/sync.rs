//! Route definitions for the `/sync` resource.
//!
//! Every endpoint requires the sync trigger bearer token.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sync;
use crate::state::AppState;

/// Routes mounted at `/sync`.
///
/// ```text
/// POST   /run                       -> run_sync
/// GET    /runs                      -> list_runs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(sync::run_sync))
        .route("/runs", get(sync::list_runs))
}
