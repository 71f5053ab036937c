//! Repository for the `alerts` table.

use medwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::alert::{Alert, CreateAlert};

/// Column list for `alerts` queries.
const COLUMNS: &str =
    "id, user_id, product_id, alert_type, is_active, last_notified_at, created_at, updated_at";

/// Provides alert lookups for the notification fan-out.
pub struct AlertRepo;

impl AlertRepo {
    /// Create an active alert, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateAlert) -> Result<Alert, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts (user_id, product_id, alert_type) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(input.user_id)
            .bind(input.product_id)
            .bind(&input.alert_type)
            .fetch_one(pool)
            .await
    }

    /// Active alerts on a product whose owner is an active user.
    pub async fn list_active_for_product(
        pool: &PgPool,
        product_id: DbId,
    ) -> Result<Vec<Alert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE product_id = $1 AND is_active = true \
               AND user_id IN (SELECT id FROM users WHERE is_active = true) \
             ORDER BY id"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(product_id)
            .fetch_all(pool)
            .await
    }

    /// Find an alert by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alerts WHERE id = $1");
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Stamp `last_notified_at` on the given alerts. Returns rows touched.
    pub async fn mark_notified(pool: &PgPool, alert_ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if alert_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE alerts SET last_notified_at = NOW(), updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(alert_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
