//! Drives reconciled records into the database.
//!
//! The catalog baseline is written in batches, shortage-driven upserts run on
//! a bounded worker pool, and the reset step runs once the pool is drained.
//! Per-item failures are returned as [`ItemError`]s; none of these functions
//! stop at the first failing product.

use futures::stream::{self, StreamExt};
use medwatch_core::availability::MedicationStatus;
use medwatch_core::error::{ItemError, ItemErrorKind};
use medwatch_core::reconcile::{ProductRecord, ReconciledProduct};
use medwatch_core::types::DbId;
use medwatch_db::models::product::{BatchUpsertCounts, UpsertOutcome};
use medwatch_db::repositories::ProductRepo;
use sqlx::PgPool;

/// `source` column of history records written by the sync pipeline.
pub const HISTORY_SOURCE: &str = "registry_sync";

/// Outcome of the catalog baseline step.
#[derive(Debug, Default)]
pub struct CatalogReport {
    pub counts: BatchUpsertCounts,
    pub errors: Vec<ItemError>,
}

/// Outcome of the shortage-driven upserts.
#[derive(Debug, Default)]
pub struct ShortageReport {
    pub created: u64,
    pub updated: u64,
    pub moved_to_tension: usize,
    pub moved_to_shortage: usize,
    pub errors: Vec<ItemError>,
}

impl ShortageReport {
    fn record(&mut self, outcome: &UpsertOutcome) {
        if outcome.created {
            self.created += 1;
        } else {
            self.updated += 1;
        }
        if outcome.status_changed() {
            match outcome.new_status {
                MedicationStatus::Shortage => self.moved_to_shortage += 1,
                MedicationStatus::Tension => self.moved_to_tension += 1,
                MedicationStatus::Available | MedicationStatus::Unknown => {}
            }
        }
    }
}

/// Upsert every catalog record, `batch_size` rows per statement.
pub async fn upsert_catalog(
    pool: &PgPool,
    records: &[ProductRecord],
    batch_size: usize,
) -> CatalogReport {
    let mut report = CatalogReport::default();
    for (index, batch) in records.chunks(batch_size.max(1)).enumerate() {
        match ProductRepo::upsert_catalog_batch(pool, batch).await {
            Ok(counts) => {
                report.counts.created += counts.created;
                report.counts.updated += counts.updated;
            }
            Err(e) => {
                let first = batch.first().map(|r| r.product_code.as_str()).unwrap_or("");
                tracing::error!(batch = index, first_code = first, error = %e, "Catalog batch failed");
                report.errors.push(ItemError::new(
                    ItemErrorKind::UpsertFailure,
                    format!("catalog batch {index} (from {first})"),
                    e,
                ));
            }
        }
    }
    report
}

/// Upsert every reconciled product with at most `workers` in flight.
pub async fn upsert_shortages(
    pool: &PgPool,
    products: Vec<ReconciledProduct>,
    workers: usize,
    sync_run_id: DbId,
) -> ShortageReport {
    let results: Vec<(String, Result<UpsertOutcome, sqlx::Error>)> = stream::iter(products)
        .map(|product| async move {
            let result =
                ProductRepo::upsert_reconciled(pool, &product, HISTORY_SOURCE, Some(sync_run_id))
                    .await;
            (product.record.product_code, result)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut report = ShortageReport::default();
    for (code, result) in results {
        match result {
            Ok(outcome) => report.record(&outcome),
            Err(e) => {
                tracing::warn!(product_code = %code, error = %e, "Product upsert failed");
                report
                    .errors
                    .push(ItemError::new(ItemErrorKind::UpsertFailure, code, e));
            }
        }
    }
    // Completion order is arbitrary; keep the error list stable.
    report.errors.sort_by(|a, b| a.item.cmp(&b.item));
    report
}

/// Reset products missing from the shortage table to AVAILABLE.
pub async fn reset_missing(
    pool: &PgPool,
    shortage_codes: &[String],
    sync_run_id: DbId,
) -> Result<usize, ItemError> {
    ProductRepo::reset_missing_to_available(pool, shortage_codes, HISTORY_SOURCE, Some(sync_run_id))
        .await
        .map(|ids| ids.len())
        .map_err(|e| {
            tracing::error!(error = %e, "Reset to AVAILABLE failed");
            ItemError::new(ItemErrorKind::ResetFailure, "products", e)
        })
}
