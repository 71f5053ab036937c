//! Repository for the `sync_runs` audit table.
//!
//! A partial unique index allows at most one row with `completed_at IS NULL`,
//! which is what makes [`SyncRunRepo::try_start`] single-flight across
//! processes.

use medwatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::sync_run::{FinishSyncRun, SyncRun};

/// Column list for `sync_runs` queries.
const COLUMNS: &str = "id, started_at, completed_at, success, products_created, \
    products_updated, status_changes, notifications_sent, errors, summary";

/// Provides lifecycle operations for sync runs.
pub struct SyncRunRepo;

impl SyncRunRepo {
    /// Open a new run. Returns `None` when another run is still in progress.
    pub async fn try_start(pool: &PgPool) -> Result<Option<SyncRun>, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_runs DEFAULT VALUES \
             ON CONFLICT DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncRun>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Close a run. Returns `None` if the run was already closed.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        input: &FinishSyncRun,
    ) -> Result<Option<SyncRun>, sqlx::Error> {
        let errors = serde_json::to_value(&input.errors).unwrap_or_default();
        let query = format!(
            "UPDATE sync_runs SET \
                completed_at = NOW(), \
                success = $2, \
                products_created = $3, \
                products_updated = $4, \
                status_changes = $5, \
                notifications_sent = $6, \
                errors = $7, \
                summary = $8 \
             WHERE id = $1 AND completed_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncRun>(&query)
            .bind(id)
            .bind(input.success)
            .bind(input.products_created)
            .bind(input.products_updated)
            .bind(input.status_changes)
            .bind(input.notifications_sent)
            .bind(&errors)
            .bind(&input.summary)
            .fetch_optional(pool)
            .await
    }

    /// Close unfinished runs older than `older_than_minutes` as failed.
    ///
    /// Recovers the single-flight slot after a process died mid-run.
    pub async fn abandon_stale(pool: &PgPool, older_than_minutes: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_runs SET \
                completed_at = NOW(), \
                success = false, \
                errors = errors || '[\"Run abandoned: no completion recorded\"]'::jsonb \
             WHERE completed_at IS NULL \
               AND started_at < NOW() - make_interval(mins => $1::int)",
        )
        .bind(older_than_minutes)
        .execute(pool)
        .await?;
        let abandoned = result.rows_affected();
        if abandoned > 0 {
            tracing::warn!(abandoned, older_than_minutes, "Closed stale sync runs");
        }
        Ok(abandoned)
    }

    /// Find a run by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SyncRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync_runs WHERE id = $1");
        sqlx::query_as::<_, SyncRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The run currently in progress, if any.
    pub async fn find_in_progress(pool: &PgPool) -> Result<Option<SyncRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync_runs WHERE completed_at IS NULL");
        sqlx::query_as::<_, SyncRun>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Runs started inside `[from, to)`, newest first. Open bounds are unbounded.
    pub async fn list_in_range(
        pool: &PgPool,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SyncRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync_runs \
             WHERE ($1::timestamptz IS NULL OR started_at >= $1) \
               AND ($2::timestamptz IS NULL OR started_at < $2) \
             ORDER BY started_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, SyncRun>(&query)
            .bind(from)
            .bind(to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
