//! User delivery preferences.

use medwatch_core::types::DbId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The columns of `users` the notification pipeline reads.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserDeliveryPrefs {
    pub id: DbId,
    pub email: String,
    pub push_enabled: bool,
    pub email_enabled: bool,
}

/// DTO for creating a user row.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub push_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
}
