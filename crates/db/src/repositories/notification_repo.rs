//! Repository for the `notifications` table.

use medwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::{CreateNotification, Notification};

/// Column list for `notifications` queries.
const COLUMNS: &str =
    "id, user_id, product_id, channel, title, body, data, is_read, read_at, created_at";

/// Provides persistence for user-visible notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Record a notification, returning the generated ID.
    pub async fn create(pool: &PgPool, input: &CreateNotification) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notifications (user_id, product_id, channel, title, body, data) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(input.user_id)
        .bind(input.product_id)
        .bind(&input.channel)
        .bind(&input.title)
        .bind(&input.body)
        .bind(&input.data)
        .fetch_one(pool)
        .await
    }

    /// List notifications for a user, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Number of notifications a user has received for a product.
    pub async fn count_for_user_product(
        pool: &PgPool,
        user_id: DbId,
        product_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }
}
