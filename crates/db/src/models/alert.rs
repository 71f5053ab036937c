//! Alert (subscription) models.

use medwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `alerts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Alert {
    pub id: DbId,
    pub user_id: DbId,
    pub product_id: DbId,
    pub alert_type: String,
    pub is_active: bool,
    pub last_notified_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an alert.
#[derive(Debug, Deserialize)]
pub struct CreateAlert {
    pub user_id: DbId,
    pub product_id: DbId,
    pub alert_type: String,
}
