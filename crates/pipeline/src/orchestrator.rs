//! End-to-end sync pass wrapped in one audited sync run.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use medwatch_core::availability::MedicationStatus;
use medwatch_core::change_detection::{
    latest_per_product, new_shortage_entries, order_change_events, ChangeDetectionStrategy,
    ChangeEvent,
};
use medwatch_core::error::{ItemError, ItemErrorKind};
use medwatch_core::reconcile::{count_statuses, Enrichment};
use medwatch_core::registry::{
    decode_latin1, parse_catalog, parse_composition, parse_generic_groups, parse_shortages,
    records, RegistryFile,
};
use medwatch_core::types::DbId;
use medwatch_db::models::sync_run::FinishSyncRun;
use medwatch_db::repositories::{ProductRepo, StatusHistoryRepo, SyncRunRepo};
use medwatch_events::{FanoutReport, NotificationFanout};
use sqlx::PgPool;

use crate::config::SyncConfig;
use crate::reconciler;
use crate::source::{FetchedFile, RegistrySource, SnapshotStore, SourceError};
use crate::summary::SyncSummary;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for a sync pass that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another pass holds the single-flight slot. Nothing was done.
    #[error("A sync run is already in progress")]
    AlreadyRunning,

    /// The pass could not start or stopped before processing any product.
    #[error("Sync run aborted: {0}")]
    RunAbort(String),

    /// The run could not be finalized.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs sync passes. Cheap to clone; clones share the pool and collaborators.
#[derive(Clone)]
pub struct SyncOrchestrator {
    pool: PgPool,
    source: Arc<dyn RegistrySource>,
    fanout: NotificationFanout,
    snapshots: Option<SnapshotStore>,
    config: Arc<SyncConfig>,
}

/// Files fetched for one pass. `None` marks a file that was unavailable.
struct FetchedFiles {
    catalog: Option<FetchedFile>,
    composition: Option<FetchedFile>,
    shortage: Option<FetchedFile>,
    generic_groups: Option<FetchedFile>,
}

impl SyncOrchestrator {
    pub fn new(
        pool: PgPool,
        source: Arc<dyn RegistrySource>,
        fanout: NotificationFanout,
        config: SyncConfig,
    ) -> Self {
        let snapshots = config.snapshot_dir.clone().map(SnapshotStore::new);
        Self {
            pool,
            source,
            fanout,
            snapshots,
            config: Arc::new(config),
        }
    }

    /// Run one complete pass.
    ///
    /// Returns [`SyncError::AlreadyRunning`] without side effects when another
    /// pass is open. Per-item failures are reported in the summary and do not
    /// fail the run.
    ///
    /// The pass runs on its own task. Dropping the returned future (a timed
    /// out request, a disconnected client) leaves it running to completion.
    pub async fn run_once(&self) -> Result<SyncSummary, SyncError> {
        let orchestrator = self.clone();
        match tokio::spawn(async move { orchestrator.run_pass().await }).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Sync task did not complete");
                Err(SyncError::RunAbort(format!("sync task failed: {e}")))
            }
        }
    }

    async fn run_pass(&self) -> Result<SyncSummary, SyncError> {
        SyncRunRepo::abandon_stale(&self.pool, self.config.stale_run_minutes)
            .await
            .map_err(|e| SyncError::RunAbort(e.to_string()))?;

        let run = SyncRunRepo::try_start(&self.pool)
            .await
            .map_err(|e| SyncError::RunAbort(e.to_string()))?
            .ok_or(SyncError::AlreadyRunning)?;

        tracing::info!(sync_run_id = run.id, "Sync run started");
        let started = Instant::now();

        match self.execute(run.id).await {
            Ok(mut summary) => {
                summary.duration_ms = started.elapsed().as_millis() as u64;
                let finish = FinishSyncRun {
                    success: true,
                    products_created: summary.products_created as i32,
                    products_updated: summary.products_updated as i32,
                    status_changes: summary.status_changes() as i32,
                    notifications_sent: summary.notifications_succeeded as i32,
                    errors: summary.errors.clone(),
                    summary: serde_json::to_value(&summary).unwrap_or_default(),
                };
                SyncRunRepo::finish(&self.pool, run.id, &finish).await?;
                tracing::info!(
                    sync_run_id = run.id,
                    duration_ms = summary.duration_ms,
                    status_changes = summary.status_changes(),
                    notifications = summary.notifications_succeeded,
                    errors = summary.errors.len(),
                    "Sync run completed",
                );
                Ok(summary)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(sync_run_id = run.id, error = %message, "Sync run aborted");
                let finish = FinishSyncRun {
                    success: false,
                    products_created: 0,
                    products_updated: 0,
                    status_changes: 0,
                    notifications_sent: 0,
                    errors: vec![message.clone()],
                    summary: serde_json::json!({}),
                };
                SyncRunRepo::finish(&self.pool, run.id, &finish).await?;
                Err(SyncError::RunAbort(message))
            }
        }
    }

    /// The pass itself. An `Err` aborts the run before any product is touched.
    async fn execute(&self, sync_run_id: DbId) -> Result<SyncSummary, sqlx::Error> {
        let existing_products = ProductRepo::count(&self.pool).await?;

        let mut errors: Vec<ItemError> = Vec::new();
        let mut summary = SyncSummary {
            sync_run_id,
            ..SyncSummary::default()
        };

        let files = self.fetch_all(&mut errors).await;

        // Parse.
        let catalog = parse_catalog(lines_of(&files.catalog));
        let composition = parse_composition(lines_of(&files.composition));
        let generic_groups = parse_generic_groups(lines_of(&files.generic_groups));
        let enrichment = Enrichment {
            catalog: &catalog,
            composition: &composition,
            generic_groups: &generic_groups,
        };

        // The snapshot is replaced only once this pass has been delivered.
        let previous_shortage_lines = match (&self.snapshots, &files.shortage) {
            (Some(store), Some(_)) => store
                .load_previous(RegistryFile::Shortage)
                .await
                .map(|bytes| records(&decode_latin1(&bytes))),
            _ => None,
        };
        if let (Some(previous), Some(current)) = (&previous_shortage_lines, &files.shortage) {
            summary.new_shortage_lines =
                Some(new_shortage_entries(previous, &current.lines).len());
        }

        // Catalog baseline.
        if files.catalog.is_some() {
            let records = enrichment.catalog_records();
            let report =
                reconciler::upsert_catalog(&self.pool, &records, self.config.catalog_batch_size)
                    .await;
            summary.products_created += report.counts.created;
            summary.products_updated += report.counts.updated;
            errors.extend(report.errors);
        }

        // Shortage-driven status, then reset.
        if let Some(shortage_file) = &files.shortage {
            let shortages = parse_shortages(&shortage_file.lines);
            let products = enrichment.reconcile_shortages(&shortages, &self.config.classification);
            let counts = count_statuses(&products);
            summary.shortage_entries = counts.shortage;
            summary.tension_entries = counts.tension;

            let report = reconciler::upsert_shortages(
                &self.pool,
                products,
                self.config.sync_workers,
                sync_run_id,
            )
            .await;
            summary.products_created += report.created;
            summary.products_updated += report.updated;
            summary.moved_to_shortage = report.moved_to_shortage;
            summary.moved_to_tension = report.moved_to_tension;
            errors.extend(report.errors);

            let codes: Vec<String> = shortages.codes().map(str::to_string).collect();
            match reconciler::reset_missing(&self.pool, &codes, sync_run_id).await {
                Ok(reset) => summary.moved_to_available = reset,
                Err(e) => errors.push(e),
            }
        } else {
            tracing::warn!(sync_run_id, "Shortage file unavailable, statuses left unchanged");
        }

        // Change detection.
        let strategy = match self.config.change_detection {
            ChangeDetectionStrategy::Stateful
                if existing_products == 0 && previous_shortage_lines.is_some() =>
            {
                ChangeDetectionStrategy::FileDiff
            }
            configured => configured,
        };
        let events = match strategy {
            ChangeDetectionStrategy::Stateful => self.stateful_events(sync_run_id).await,
            ChangeDetectionStrategy::FileDiff => {
                let previous = previous_shortage_lines.unwrap_or_default();
                let current = files
                    .shortage
                    .as_ref()
                    .map(|f| f.lines.clone())
                    .unwrap_or_default();
                self.file_diff_events(&previous, &current).await
            }
        };
        let detection_failed = events.is_err();
        let mut events = match events {
            Ok(events) => events,
            Err(e) => {
                errors.push(ItemError::new(
                    ItemErrorKind::DeliveryFailure,
                    "change_detection",
                    e,
                ));
                Vec::new()
            }
        };
        order_change_events(&mut events);
        summary.change_events = events.len();
        tracing::info!(
            sync_run_id,
            strategy = strategy.as_str(),
            events = events.len(),
            "Change detection complete",
        );

        // Fan-out.
        let (report, fanout_errors) = self.fan_out(events).await;
        summary.notifications_attempted = report.attempted;
        summary.notifications_succeeded = report.succeeded;
        summary.notifications_failed = report.failed;
        if !report.failed_endpoints.is_empty() {
            tracing::warn!(
                sync_run_id,
                count = report.failed_endpoints.len(),
                "Some notification endpoints failed",
            );
        }
        summary.failed_endpoints = report.failed_endpoints;
        let delivered = !detection_failed && fanout_errors.is_empty();
        errors.extend(fanout_errors);
        errors.extend(report.failed_records.into_iter().map(|record| {
            ItemError::new(ItemErrorKind::DeliveryFailure, record.item, record.error)
        }));

        if let (Some(store), Some(current)) = (&self.snapshots, &files.shortage) {
            if !delivered {
                tracing::warn!(sync_run_id, "Change delivery incomplete, keeping previous snapshot");
            } else if let Err(e) = store.save(RegistryFile::Shortage, &current.bytes).await {
                tracing::warn!(error = %e, "Failed to save shortage snapshot");
            }
        }

        summary.errors = errors.iter().map(ToString::to_string).collect();
        Ok(summary)
    }

    /// Fetch every registry file concurrently, each bounded by the fetch timeout.
    async fn fetch_all(&self, errors: &mut Vec<ItemError>) -> FetchedFiles {
        let (catalog, composition, shortage, generic_groups) = tokio::join!(
            self.fetch(RegistryFile::Catalog),
            self.fetch(RegistryFile::Composition),
            self.fetch(RegistryFile::Shortage),
            self.fetch(RegistryFile::GenericGroups),
        );

        let mut keep = |result: Result<FetchedFile, SourceError>| match result {
            Ok(file) => Some(file),
            Err(e) => {
                let file = e.file();
                if file == RegistryFile::GenericGroups {
                    tracing::info!(error = %e, "Optional generic-group file unavailable");
                    return None;
                }
                tracing::warn!(file = %file, error = %e, "Registry file unavailable");
                let kind = match e {
                    SourceError::SourceUnavailable { .. } => ItemErrorKind::SourceUnavailable,
                    SourceError::DecodeError { .. } => ItemErrorKind::DecodeError,
                };
                let message = match e {
                    SourceError::SourceUnavailable { reason, .. }
                    | SourceError::DecodeError { reason, .. } => reason,
                };
                errors.push(ItemError::new(kind, file.default_file_name(), message));
                None
            }
        };

        FetchedFiles {
            catalog: keep(catalog),
            composition: keep(composition),
            shortage: keep(shortage),
            generic_groups: keep(generic_groups),
        }
    }

    async fn fetch(&self, file: RegistryFile) -> Result<FetchedFile, SourceError> {
        match tokio::time::timeout(self.config.fetch_timeout, self.source.fetch(file)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::unavailable(
                file,
                format!("timed out after {}s", self.config.fetch_timeout.as_secs()),
            )),
        }
    }

    /// Changes are the history records written during this run.
    async fn stateful_events(&self, sync_run_id: DbId) -> Result<Vec<ChangeEvent>, sqlx::Error> {
        let changes = StatusHistoryRepo::list_for_run(&self.pool, sync_run_id).await?;
        let events = changes
            .into_iter()
            .map(|c| ChangeEvent {
                product_id: c.product_id,
                product_code: c.product_code,
                product_name: c.product_name,
                new_status: MedicationStatus::from_str(&c.status)
                    .unwrap_or(MedicationStatus::Unknown),
            })
            .collect();
        Ok(latest_per_product(events))
    }

    /// Changes are the shortage entries absent from the previous snapshot.
    async fn file_diff_events(
        &self,
        previous: &[String],
        current: &[String],
    ) -> Result<Vec<ChangeEvent>, sqlx::Error> {
        let mut events = Vec::new();
        for entry in new_shortage_entries(previous, current) {
            let Some(product) = ProductRepo::find_by_code(&self.pool, &entry.product_code).await?
            else {
                continue;
            };
            events.push(ChangeEvent {
                product_id: product.id,
                product_code: product.product_code,
                product_name: product.name,
                new_status: self.config.classification.classify(&entry.status_text),
            });
        }
        Ok(latest_per_product(events))
    }

    /// Fan out events concurrently, folding the reports.
    async fn fan_out(&self, events: Vec<ChangeEvent>) -> (FanoutReport, Vec<ItemError>) {
        let results: Vec<_> = stream::iter(events)
            .map(|event| {
                let fanout = self.fanout.clone();
                async move {
                    let result = fanout.notify(&event).await;
                    (event.product_code, result)
                }
            })
            .buffer_unordered(self.config.fanout_concurrency.max(1))
            .collect()
            .await;

        let mut report = FanoutReport::default();
        let mut errors = Vec::new();
        for (code, result) in results {
            match result {
                Ok(r) => report.merge(r),
                Err(e) => {
                    tracing::warn!(product_code = %code, error = %e, "Fan-out failed");
                    errors.push(ItemError::new(ItemErrorKind::DeliveryFailure, code, e));
                }
            }
        }
        (report, errors)
    }
}

fn lines_of(file: &Option<FetchedFile>) -> &[String] {
    file.as_ref().map(|f| f.lines.as_slice()).unwrap_or(&[])
}
