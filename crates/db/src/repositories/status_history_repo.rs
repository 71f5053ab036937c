//! Repository for the append-only `status_history` table.

use medwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::status_history::{ProductStatusChange, StatusHistoryRecord};

/// Column list for `status_history` queries.
const COLUMNS: &str = "id, product_id, status, source, detail, sync_run_id, created_at";

/// Read access to status history. Rows are written by [`super::ProductRepo`].
pub struct StatusHistoryRepo;

impl StatusHistoryRepo {
    /// History of one product, oldest first.
    pub async fn list_for_product(
        pool: &PgPool,
        product_id: DbId,
    ) -> Result<Vec<StatusHistoryRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM status_history \
             WHERE product_id = $1 \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, StatusHistoryRecord>(&query)
            .bind(product_id)
            .fetch_all(pool)
            .await
    }

    /// Number of history records for a product.
    pub async fn count_for_product(pool: &PgPool, product_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM status_history WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Every status change recorded during a sync run, joined with the
    /// product's code and current name, in insertion order.
    pub async fn list_for_run(
        pool: &PgPool,
        sync_run_id: DbId,
    ) -> Result<Vec<ProductStatusChange>, sqlx::Error> {
        sqlx::query_as::<_, ProductStatusChange>(
            "SELECT h.id AS history_id, h.product_id, p.product_code, \
                    p.name AS product_name, h.status, h.created_at \
             FROM status_history h \
             JOIN products p ON p.id = h.product_id \
             WHERE h.sync_run_id = $1 \
             ORDER BY h.id",
        )
        .bind(sync_run_id)
        .fetch_all(pool)
        .await
    }
}
