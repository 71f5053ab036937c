//! Push delivery endpoint models.

use medwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `push_tokens` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token: String,
    pub platform: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a push token.
#[derive(Debug, Deserialize)]
pub struct CreatePushToken {
    pub user_id: DbId,
    pub token: String,
    pub platform: Option<String>,
}
