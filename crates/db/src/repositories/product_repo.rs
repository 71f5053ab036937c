//! Repository for the `products` table and its status history writes.

use medwatch_core::availability::MedicationStatus;
use medwatch_core::reconcile::{ProductRecord, ReconciledProduct};
use medwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::product::{BatchUpsertCounts, Product, UpsertOutcome};

/// Column list for `products` queries.
const COLUMNS: &str = "id, product_code, name, form, route, manufacturer, active_ingredient, \
    generic_group, status, status_text, shortage_info_url, expected_return_date, \
    last_checked, created_at, updated_at";

/// Detail written to history when a product leaves the shortage file.
const RESET_DETAIL: &str = "No longer listed in the shortage file";

/// Provides upsert and lookup operations for products.
pub struct ProductRepo;

impl ProductRepo {
    /// Find a product by its regulator code.
    pub async fn find_by_code(
        pool: &PgPool,
        product_code: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE product_code = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(product_code)
            .fetch_optional(pool)
            .await
    }

    /// Find a product by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Total number of products.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await?;
        Ok(count.unwrap_or(0))
    }

    /// Upsert a batch of catalog records.
    ///
    /// New rows are created as AVAILABLE without a history record. Existing
    /// rows get their descriptive columns refreshed; their status is never
    /// touched here. Ingredient and group are only overwritten with non-null
    /// values. Codes must be unique within the batch.
    pub async fn upsert_catalog_batch(
        pool: &PgPool,
        records: &[ProductRecord],
    ) -> Result<BatchUpsertCounts, sqlx::Error> {
        if records.is_empty() {
            return Ok(BatchUpsertCounts::default());
        }

        let codes: Vec<&str> = records.iter().map(|r| r.product_code.as_str()).collect();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let forms: Vec<Option<&str>> = records.iter().map(|r| r.form.as_deref()).collect();
        let routes: Vec<Option<&str>> = records.iter().map(|r| r.route.as_deref()).collect();
        let manufacturers: Vec<Option<&str>> =
            records.iter().map(|r| r.manufacturer.as_deref()).collect();
        let ingredients: Vec<Option<&str>> = records
            .iter()
            .map(|r| r.active_ingredient.as_deref())
            .collect();
        let groups: Vec<Option<&str>> =
            records.iter().map(|r| r.generic_group.as_deref()).collect();

        let inserted: Vec<bool> = sqlx::query_scalar(
            "INSERT INTO products \
                (product_code, name, form, route, manufacturer, active_ingredient, \
                 generic_group, status, last_checked) \
             SELECT code, name, form, route, manufacturer, ingredient, grp, 'AVAILABLE', NOW() \
             FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], \
                         $6::text[], $7::text[]) \
                  AS t(code, name, form, route, manufacturer, ingredient, grp) \
             ON CONFLICT (product_code) DO UPDATE SET \
                name = EXCLUDED.name, \
                form = EXCLUDED.form, \
                route = EXCLUDED.route, \
                manufacturer = EXCLUDED.manufacturer, \
                active_ingredient = COALESCE(EXCLUDED.active_ingredient, products.active_ingredient), \
                generic_group = COALESCE(EXCLUDED.generic_group, products.generic_group), \
                last_checked = NOW(), \
                updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(&codes)
        .bind(&names)
        .bind(&forms)
        .bind(&routes)
        .bind(&manufacturers)
        .bind(&ingredients)
        .bind(&groups)
        .fetch_all(pool)
        .await?;

        let created = inserted.iter().filter(|&&is_new| is_new).count() as u64;
        Ok(BatchUpsertCounts {
            created,
            updated: inserted.len() as u64 - created,
        })
    }

    /// Upsert one product from the shortage table.
    ///
    /// Runs in a single transaction: the stored status is read under a row
    /// lock, a history record is appended when it differs from the new status
    /// (a new row always counts as a change), then the product row is
    /// written. Re-running with the same input appends nothing.
    pub async fn upsert_reconciled(
        pool: &PgPool,
        product: &ReconciledProduct,
        source: &str,
        sync_run_id: Option<DbId>,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let record = &product.record;
        let mut tx = pool.begin().await?;

        let existing: Option<(DbId, String)> = sqlx::query_as(
            "SELECT id, status FROM products WHERE product_code = $1 FOR UPDATE",
        )
        .bind(&record.product_code)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some((product_id, stored)) => {
                let previous_status =
                    MedicationStatus::from_str(&stored).unwrap_or(MedicationStatus::Unknown);
                let outcome = UpsertOutcome {
                    product_id,
                    created: false,
                    previous_status: Some(previous_status),
                    new_status: product.status,
                };
                if outcome.status_changed() {
                    Self::append_history(&mut tx, product_id, product, source, sync_run_id)
                        .await?;
                }
                sqlx::query(
                    "UPDATE products SET \
                        name = CASE WHEN $3 THEN $2 ELSE name END, \
                        form = COALESCE($4, form), \
                        route = COALESCE($5, route), \
                        manufacturer = COALESCE($6, manufacturer), \
                        active_ingredient = COALESCE($7, active_ingredient), \
                        generic_group = COALESCE($8, generic_group), \
                        status = $9, \
                        status_text = $10, \
                        expected_return_date = $11, \
                        shortage_info_url = $12, \
                        last_checked = NOW(), \
                        updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(product_id)
                .bind(&record.name)
                .bind(record.in_catalog)
                .bind(&record.form)
                .bind(&record.route)
                .bind(&record.manufacturer)
                .bind(&record.active_ingredient)
                .bind(&record.generic_group)
                .bind(product.status.as_str())
                .bind(&product.status_text)
                .bind(product.expected_return_date)
                .bind(&product.info_url)
                .execute(&mut *tx)
                .await?;
                outcome
            }
            None => {
                let product_id: DbId = sqlx::query_scalar(
                    "INSERT INTO products \
                        (product_code, name, form, route, manufacturer, active_ingredient, \
                         generic_group, status, status_text, expected_return_date, \
                         shortage_info_url, last_checked) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW()) \
                     RETURNING id",
                )
                .bind(&record.product_code)
                .bind(&record.name)
                .bind(&record.form)
                .bind(&record.route)
                .bind(&record.manufacturer)
                .bind(&record.active_ingredient)
                .bind(&record.generic_group)
                .bind(product.status.as_str())
                .bind(&product.status_text)
                .bind(product.expected_return_date)
                .bind(&product.info_url)
                .fetch_one(&mut *tx)
                .await?;
                Self::append_history(&mut tx, product_id, product, source, sync_run_id).await?;
                UpsertOutcome {
                    product_id,
                    created: true,
                    previous_status: None,
                    new_status: product.status,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn append_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        product_id: DbId,
        product: &ReconciledProduct,
        source: &str,
        sync_run_id: Option<DbId>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO status_history (product_id, status, source, detail, sync_run_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(product_id)
        .bind(product.status.as_str())
        .bind(source)
        .bind(&product.status_text)
        .bind(sync_run_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Reset every product absent from `shortage_codes` whose status is not
    /// AVAILABLE back to AVAILABLE, appending one history record each.
    ///
    /// A single statement, so the update and its history rows commit
    /// together. Returns the IDs of the reset products.
    pub async fn reset_missing_to_available(
        pool: &PgPool,
        shortage_codes: &[String],
        source: &str,
        sync_run_id: Option<DbId>,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "WITH reset AS ( \
                UPDATE products SET \
                    status = 'AVAILABLE', \
                    status_text = NULL, \
                    expected_return_date = NULL, \
                    shortage_info_url = NULL, \
                    last_checked = NOW(), \
                    updated_at = NOW() \
                WHERE status <> 'AVAILABLE' AND NOT (product_code = ANY($1)) \
                RETURNING id \
             ) \
             INSERT INTO status_history (product_id, status, source, detail, sync_run_id) \
             SELECT id, 'AVAILABLE', $2, $3, $4 FROM reset \
             RETURNING product_id",
        )
        .bind(shortage_codes)
        .bind(source)
        .bind(RESET_DETAIL)
        .bind(sync_run_id)
        .fetch_all(pool)
        .await
    }
}
