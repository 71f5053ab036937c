//! Status history models.

use medwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the append-only `status_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusHistoryRecord {
    pub id: DbId,
    pub product_id: DbId,
    pub status: String,
    pub source: String,
    pub detail: Option<String>,
    pub sync_run_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// A history record joined with the product it belongs to.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductStatusChange {
    pub history_id: DbId,
    pub product_id: DbId,
    pub product_code: String,
    pub product_name: String,
    pub status: String,
    pub created_at: Timestamp,
}
