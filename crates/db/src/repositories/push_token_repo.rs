//! Repository for the `push_tokens` table.

use medwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::push_token::{CreatePushToken, PushToken};

/// Column list for `push_tokens` queries.
const COLUMNS: &str = "id, user_id, token, platform, is_active, created_at, updated_at";

/// Provides push token registration and lookup.
pub struct PushTokenRepo;

impl PushTokenRepo {
    /// Register a token, reactivating it (and reassigning it) if it exists.
    pub async fn upsert(pool: &PgPool, input: &CreatePushToken) -> Result<PushToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO push_tokens (user_id, token, platform) \
             VALUES ($1, $2, COALESCE($3, 'unknown')) \
             ON CONFLICT (token) DO UPDATE SET \
                user_id = EXCLUDED.user_id, \
                platform = EXCLUDED.platform, \
                is_active = true, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushToken>(&query)
            .bind(input.user_id)
            .bind(&input.token)
            .bind(&input.platform)
            .fetch_one(pool)
            .await
    }

    /// Active tokens belonging to any of `user_ids`, ordered by user then id.
    pub async fn list_active_for_users(
        pool: &PgPool,
        user_ids: &[DbId],
    ) -> Result<Vec<PushToken>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM push_tokens \
             WHERE user_id = ANY($1) AND is_active = true \
             ORDER BY user_id, id"
        );
        sqlx::query_as::<_, PushToken>(&query)
            .bind(user_ids)
            .fetch_all(pool)
            .await
    }

    /// Deactivate tokens the push provider reported as unregistered.
    pub async fn deactivate(pool: &PgPool, tokens: &[String]) -> Result<u64, sqlx::Error> {
        if tokens.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE push_tokens SET is_active = false, updated_at = NOW() \
             WHERE token = ANY($1) AND is_active = true",
        )
        .bind(tokens)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
