//! Notification entity models and DTOs.

use medwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub product_id: DbId,
    pub channel: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for recording a notification sent to a user.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: DbId,
    pub product_id: DbId,
    pub channel: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}
