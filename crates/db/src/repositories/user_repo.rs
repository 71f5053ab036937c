//! Repository for the `users` table.

use medwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, UserDeliveryPrefs};

/// Provides user creation and delivery preference lookups.
pub struct UserRepo;

impl UserRepo {
    /// Create a user, returning the generated ID.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO users (email, push_enabled, email_enabled) \
             VALUES ($1, COALESCE($2, true), COALESCE($3, false)) \
             RETURNING id",
        )
        .bind(&input.email)
        .bind(input.push_enabled)
        .bind(input.email_enabled)
        .fetch_one(pool)
        .await
    }

    /// Delivery preferences of the active users among `user_ids`.
    pub async fn list_delivery_prefs(
        pool: &PgPool,
        user_ids: &[DbId],
    ) -> Result<Vec<UserDeliveryPrefs>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserDeliveryPrefs>(
            "SELECT id, email, push_enabled, email_enabled FROM users \
             WHERE id = ANY($1) AND is_active = true \
             ORDER BY id",
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await
    }

    /// Deactivate a user. Their alerts stop matching.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = false, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
