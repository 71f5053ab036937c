//! Product entity model.

use chrono::NaiveDate;
use medwatch_core::availability::MedicationStatus;
use medwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `products` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: DbId,
    pub product_code: String,
    pub name: String,
    pub form: Option<String>,
    pub route: Option<String>,
    pub manufacturer: Option<String>,
    pub active_ingredient: Option<String>,
    pub generic_group: Option<String>,
    pub status: String,
    pub status_text: Option<String>,
    pub shortage_info_url: Option<String>,
    pub expected_return_date: Option<NaiveDate>,
    pub last_checked: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Product {
    /// Parsed status; the CHECK constraint guarantees a known value.
    pub fn status(&self) -> MedicationStatus {
        MedicationStatus::from_str(&self.status).unwrap_or(MedicationStatus::Unknown)
    }
}

/// Result of upserting one reconciled product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub product_id: DbId,
    /// `true` when the row did not exist before.
    pub created: bool,
    /// Stored status before the upsert; `None` for a new row.
    pub previous_status: Option<MedicationStatus>,
    pub new_status: MedicationStatus,
}

impl UpsertOutcome {
    /// Whether a status-history record was appended.
    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.new_status)
    }
}

/// Created/updated counters for a catalog batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchUpsertCounts {
    pub created: u64,
    pub updated: u64,
}
