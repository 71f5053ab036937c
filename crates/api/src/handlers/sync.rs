//! Handlers for the `/sync` resource.

use axum::extract::{Query, State};
use axum::Json;
use medwatch_core::error::CoreError;
use medwatch_core::types::Timestamp;
use medwatch_db::models::sync_run::SyncRun;
use medwatch_db::repositories::SyncRunRepo;
use medwatch_pipeline::SyncSummary;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::SyncTrigger;
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Query parameters for `GET /sync/runs`.
#[derive(Debug, Deserialize)]
pub struct RunRangeParams {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/v1/sync/run
///
/// Runs one full pass and returns its summary once it has finished.
pub async fn run_sync(
    _trigger: SyncTrigger,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<SyncSummary>>> {
    tracing::info!("Sync run requested over HTTP");
    let summary = state.orchestrator.run_once().await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/sync/runs?from=&to=&limit=&offset=
pub async fn list_runs(
    _trigger: SyncTrigger,
    State(state): State<AppState>,
    Query(params): Query<RunRangeParams>,
) -> AppResult<Json<DataResponse<Vec<SyncRun>>>> {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(CoreError::Validation("'from' must not be after 'to'".into()).into());
        }
    }
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let runs = SyncRunRepo::list_in_range(&state.pool, params.from, params.to, limit, offset).await?;
    Ok(Json(DataResponse { data: runs }))
}
