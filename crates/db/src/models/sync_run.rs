//! Sync run audit record.

use medwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncRun {
    pub id: DbId,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub success: bool,
    pub products_created: i32,
    pub products_updated: i32,
    pub status_changes: i32,
    pub notifications_sent: i32,
    pub errors: serde_json::Value,
    pub summary: serde_json::Value,
}

/// Final values written when a run completes.
#[derive(Debug, Clone)]
pub struct FinishSyncRun {
    pub success: bool,
    pub products_created: i32,
    pub products_updated: i32,
    pub status_changes: i32,
    pub notifications_sent: i32,
    pub errors: Vec<String>,
    pub summary: serde_json::Value,
}
