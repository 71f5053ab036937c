//! Integration tests for product upserts, status history and the reset step.

use medwatch_core::availability::MedicationStatus;
use medwatch_core::reconcile::{ProductRecord, ReconciledProduct};
use medwatch_db::repositories::{ProductRepo, StatusHistoryRepo, SyncRunRepo};
use sqlx::PgPool;

const SOURCE: &str = "test";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(code: &str, name: &str) -> ProductRecord {
    ProductRecord {
        product_code: code.to_string(),
        name: name.to_string(),
        in_catalog: true,
        form: Some("comprimé".to_string()),
        route: Some("orale".to_string()),
        manufacturer: Some("SANOFI".to_string()),
        active_ingredient: None,
        generic_group: None,
    }
}

fn reconciled(code: &str, name: &str, status: MedicationStatus) -> ReconciledProduct {
    ReconciledProduct {
        record: record(code, name),
        status,
        status_text: match status {
            MedicationStatus::Shortage => "Rupture de stock".to_string(),
            _ => "Tension d'approvisionnement".to_string(),
        },
        level: 2,
        expected_return_date: None,
        info_url: Some("https://example.org/info".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Catalog batch
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn catalog_batch_creates_available_products_without_history(pool: PgPool) {
    let records = vec![record("CIS001", "DOLIPRANE"), record("CIS002", "AMOXICILLINE")];

    let counts = ProductRepo::upsert_catalog_batch(&pool, &records)
        .await
        .unwrap();
    assert_eq!(counts.created, 2);
    assert_eq!(counts.updated, 0);

    let product = ProductRepo::find_by_code(&pool, "CIS001")
        .await
        .unwrap()
        .expect("product should exist");
    assert_eq!(product.status(), MedicationStatus::Available);
    assert_eq!(
        StatusHistoryRepo::count_for_product(&pool, product.id)
            .await
            .unwrap(),
        0
    );

    let again = ProductRepo::upsert_catalog_batch(&pool, &records)
        .await
        .unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.updated, 2);
    assert_eq!(ProductRepo::count(&pool).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn catalog_batch_never_touches_status(pool: PgPool) {
    ProductRepo::upsert_reconciled(
        &pool,
        &reconciled("CIS001", "DOLIPRANE", MedicationStatus::Shortage),
        SOURCE,
        None,
    )
    .await
    .unwrap();

    ProductRepo::upsert_catalog_batch(&pool, &[record("CIS001", "DOLIPRANE 1000mg")])
        .await
        .unwrap();

    let product = ProductRepo::find_by_code(&pool, "CIS001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.name, "DOLIPRANE 1000mg");
    assert_eq!(product.status(), MedicationStatus::Shortage);
}

// ---------------------------------------------------------------------------
// Reconciled upsert
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn status_change_appends_one_history_record(pool: PgPool) {
    ProductRepo::upsert_catalog_batch(&pool, &[record("CIS001", "DOLIPRANE")])
        .await
        .unwrap();

    let outcome = ProductRepo::upsert_reconciled(
        &pool,
        &reconciled("CIS001", "DOLIPRANE", MedicationStatus::Shortage),
        SOURCE,
        None,
    )
    .await
    .unwrap();

    assert!(!outcome.created);
    assert!(outcome.status_changed());
    assert_eq!(outcome.previous_status, Some(MedicationStatus::Available));

    let history = StatusHistoryRepo::list_for_product(&pool, outcome.product_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, "SHORTAGE");
    assert_eq!(history[0].detail.as_deref(), Some("Rupture de stock"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_upsert_is_idempotent(pool: PgPool) {
    let product = reconciled("CIS001", "DOLIPRANE", MedicationStatus::Tension);

    let first = ProductRepo::upsert_reconciled(&pool, &product, SOURCE, None)
        .await
        .unwrap();
    let second = ProductRepo::upsert_reconciled(&pool, &product, SOURCE, None)
        .await
        .unwrap();

    assert!(first.created);
    assert!(first.status_changed());
    assert!(!second.created);
    assert!(!second.status_changed());
    assert_eq!(
        StatusHistoryRepo::count_for_product(&pool, first.product_id)
            .await
            .unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fallback_name_does_not_overwrite_catalog_name(pool: PgPool) {
    ProductRepo::upsert_catalog_batch(&pool, &[record("CIS001", "DOLIPRANE")])
        .await
        .unwrap();

    let mut product = reconciled("CIS001", "Product CIS001", MedicationStatus::Shortage);
    product.record.in_catalog = false;
    product.record.form = None;
    ProductRepo::upsert_reconciled(&pool, &product, SOURCE, None)
        .await
        .unwrap();

    let stored = ProductRepo::find_by_code(&pool, "CIS001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "DOLIPRANE");
    assert_eq!(stored.form.as_deref(), Some("comprimé"));
}

// ---------------------------------------------------------------------------
// Reset
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn products_absent_from_shortage_file_return_to_available(pool: PgPool) {
    let run = SyncRunRepo::try_start(&pool).await.unwrap().unwrap();
    for (code, status) in [
        ("CIS001", MedicationStatus::Shortage),
        ("CIS002", MedicationStatus::Tension),
    ] {
        ProductRepo::upsert_reconciled(&pool, &reconciled(code, code, status), SOURCE, None)
            .await
            .unwrap();
    }

    let reset = ProductRepo::reset_missing_to_available(
        &pool,
        &["CIS002".to_string()],
        SOURCE,
        Some(run.id),
    )
    .await
    .unwrap();

    assert_eq!(reset.len(), 1);
    let cis001 = ProductRepo::find_by_code(&pool, "CIS001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reset[0], cis001.id);
    assert_eq!(cis001.status(), MedicationStatus::Available);
    assert_eq!(cis001.status_text, None);
    assert_eq!(cis001.shortage_info_url, None);

    let cis002 = ProductRepo::find_by_code(&pool, "CIS002")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cis002.status(), MedicationStatus::Tension);

    let changes = StatusHistoryRepo::list_for_run(&pool, run.id).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].product_code, "CIS001");
    assert_eq!(changes[0].status, "AVAILABLE");

    let again = ProductRepo::reset_missing_to_available(
        &pool,
        &["CIS002".to_string()],
        SOURCE,
        Some(run.id),
    )
    .await
    .unwrap();
    assert!(again.is_empty());
}
