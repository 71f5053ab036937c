pub mod health;
pub mod sync;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /sync/run                                        run one pass (POST)
/// /sync/runs                                       audited runs in a time range
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/sync", sync::router())
}
